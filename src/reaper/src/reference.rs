//! Fully-qualified image references (`host/repository:tag`).

/// Builds the reference under which an artifact tag is pulled.
pub fn image_reference(host: &str, repository: &str, tag: &str) -> String {
    format!("{host}/{repository}:{tag}")
}

/// Repository part of an image pulled from `host`.
///
/// Strips `host/` and truncates at the last `:`. Returns `None` for images
/// hosted elsewhere or carrying no tag.
pub fn repository_of<'a>(image: &'a str, host: &str) -> Option<&'a str> {
    let rest = image.strip_prefix(host)?.strip_prefix('/')?;
    let (repository, _tag) = rest.rsplit_once(':')?;
    (!repository.is_empty()).then_some(repository)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_reference() {
        assert_eq!(
            image_reference("harbor.example.com", "dev/app1", "v1.0.1"),
            "harbor.example.com/dev/app1:v1.0.1"
        );
    }

    #[test]
    fn test_repository_of() {
        let host = "harbor.example.com";
        assert_eq!(
            repository_of("harbor.example.com/dev/app1:v1.0.1", host),
            Some("dev/app1")
        );
        assert_eq!(
            repository_of("harbor.example.com/team/nested/app:1", host),
            Some("team/nested/app")
        );
    }

    #[test]
    fn test_repository_of_host_with_port() {
        assert_eq!(
            repository_of("harbor:8443/dev/app:latest", "harbor:8443"),
            Some("dev/app")
        );
    }

    #[test]
    fn test_repository_of_rejects_foreign_and_untagged_images() {
        let host = "harbor.example.com";
        assert_eq!(repository_of("docker.io/library/nginx:1.25", host), None);
        assert_eq!(repository_of("harbor.example.com.evil/app:1", host), None);
        assert_eq!(repository_of("harbor.example.com/dev/app1", host), None);
        assert_eq!(repository_of("harbor.example.com/:v1", host), None);
    }
}
