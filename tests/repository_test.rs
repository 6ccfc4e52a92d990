// ============================================
// TANZU CLI - Object Store Repository Tests
// ============================================

//! Drives the GCS-backed repository against a mock JSON API server.

#[cfg(test)]
mod repository_tests {
    use std::time::Duration;
    use tanzu::plugins::{
        Arch, GcpBucketRepository, GcpRepositoryOptions, Repository, VersionSelector,
    };
    use tanzu::PluginError;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BUCKET: &str = "tanzu-cli";

    fn media_path(object: &str) -> String {
        format!("/storage/v1/b/{}/o/{}", BUCKET, object.replace('/', "%2F"))
    }

    fn list_path() -> String {
        format!("/storage/v1/b/{}/o", BUCKET)
    }

    fn repo(server: &MockServer) -> GcpBucketRepository {
        GcpBucketRepository::new(
            GcpRepositoryOptions::community()
                .with_endpoint(server.uri())
                .with_manifest_timeout(Duration::from_millis(500)),
        )
    }

    async fn mount_object(server: &MockServer, object: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(media_path(object)))
            .and(query_param("alt", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    async fn mount_listing(server: &MockServer, prefix: &str, objects: &[&str]) {
        let items: Vec<serde_json::Value> = objects
            .iter()
            .map(|name| serde_json::json!({ "name": name }))
            .collect();
        Mock::given(method("GET"))
            .and(path(list_path()))
            .and(query_param("prefix", prefix))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "items": items })))
            .mount(server)
            .await;
    }

    async fn seed_login(server: &MockServer) {
        mount_object(
            server,
            "artifacts/manifest.yaml",
            "created: 2022-03-01T10:00:00Z\ncoreVersion: v0.28.0\nplugins:\n  - name: login\n",
        )
        .await;
        mount_object(
            server,
            "artifacts/login/plugin.yaml",
            "name: login\ndescription: Login to the platform\n",
        )
        .await;
        mount_listing(
            server,
            "artifacts/login/",
            &[
                "artifacts/login/plugin.yaml",
                "artifacts/login/v0.27.0/tanzu-login-linux_amd64",
                "artifacts/login/v0.28.0/tanzu-login-linux_amd64",
                "artifacts/login/v0.29.0-alpha.1/tanzu-login-linux_amd64",
            ],
        )
        .await;
    }

    #[tokio::test]
    async fn test_list_reads_manifest_and_versions() {
        let server = MockServer::start().await;
        seed_login(&server).await;

        let repo = repo(&server);
        let manifest = repo.manifest().await.unwrap();
        assert_eq!(manifest.core_version(), "v0.28.0");
        assert!(manifest.created_time.is_some());

        let plugins = repo.list().await.unwrap();
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].description, "Login to the platform");
        assert_eq!(plugins[0].versions, vec!["v0.27.0", "v0.28.0", "v0.29.0-alpha.1"]);
    }

    #[tokio::test]
    async fn test_fetch_latest_resolves_through_selector() {
        let server = MockServer::start().await;
        seed_login(&server).await;
        mount_object(&server, "artifacts/login/v0.28.0/tanzu-login-linux_amd64", "stable-bin").await;
        mount_object(&server, "artifacts/login/v0.29.0-alpha.1/tanzu-login-linux_amd64", "alpha-bin")
            .await;

        let stable = repo(&server);
        let bytes = stable.fetch("login", "latest", Arch::LinuxAmd64).await.unwrap();
        assert_eq!(bytes, b"stable-bin");

        let alpha = GcpBucketRepository::new(
            GcpRepositoryOptions::community()
                .with_endpoint(server.uri())
                .with_version_selector(VersionSelector::Alpha),
        );
        let bytes = alpha.fetch("login", "latest", Arch::LinuxAmd64).await.unwrap();
        assert_eq!(bytes, b"alpha-bin");
    }

    #[tokio::test]
    async fn test_listing_follows_page_tokens() {
        let server = MockServer::start().await;
        mount_object(&server, "artifacts/cluster/plugin.yaml", "name: cluster\n").await;

        Mock::given(method("GET"))
            .and(path(list_path()))
            .and(query_param("pageToken", "next"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{ "name": "artifacts/cluster/v0.2.0/tanzu-cluster-linux_amd64" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(list_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{ "name": "artifacts/cluster/v0.1.0/tanzu-cluster-linux_amd64" }],
                "nextPageToken": "next"
            })))
            .mount(&server)
            .await;

        let plugin = repo(&server).describe("cluster").await.unwrap();
        assert_eq!(plugin.versions, vec!["v0.1.0", "v0.2.0"]);
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let server = MockServer::start().await;
        seed_login(&server).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = repo(&server)
            .fetch("login", "v0.27.0", Arch::DarwinArm64)
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "unexpected error: {}", err);
    }

    #[tokio::test]
    async fn test_server_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = repo(&server).manifest().await.unwrap_err();
        assert!(matches!(err, PluginError::Transport { .. }));
        assert!(err.to_string().contains("artifacts/manifest.yaml"));
    }

    #[tokio::test]
    async fn test_slow_manifest_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(media_path("artifacts/manifest.yaml")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("plugins: []\n")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let err = repo(&server).manifest().await.unwrap_err();
        assert!(matches!(err, PluginError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_undecodable_manifest_names_its_source() {
        let server = MockServer::start().await;
        mount_object(&server, "artifacts/manifest.yaml", "plugins: {not: [a list").await;

        let err = repo(&server).manifest().await.unwrap_err();
        assert!(matches!(err, PluginError::Decode { .. }));
        assert!(err.to_string().contains("manifest.yaml"));
    }
}
