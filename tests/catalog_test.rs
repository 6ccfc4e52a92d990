// ============================================
// TANZU CLI - Catalog Scenario Tests
// ============================================

//! End-to-end install/list/delete against a local repository whose
//! artifacts are shell scripts answering the `info` protocol.

#[cfg(all(test, unix))]
mod catalog_tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use tanzu::plugins::{Arch, Catalog, LocalRepository, MultiRepo, Repository};
    use tempfile::tempdir;

    const ARCH: Arch = Arch::LinuxAmd64;

    fn plugin_script(name: &str, version: &str, log: Option<&Path>) -> String {
        let post_install = match log {
            Some(log) => format!(
                "if [ \"$1\" = \"post-install\" ]; then\n  echo {} >> {}\n  exit 0\nfi\n",
                name,
                log.display()
            ),
            None => String::new(),
        };
        format!(
            r#"#!/bin/sh
{post_install}if [ "$1" = "info" ]; then
  echo '{{"name":"{name}","description":"{name} plugin","version":"{version}","group":"Run","buildSHA":"abc123"}}'
  exit 0
fi
echo "{name} $@"
"#,
            name = name,
            version = version,
            post_install = post_install
        )
    }

    /// Lay out a local repository holding `plugins` as `(name, version)`.
    fn seed_repository(root: &Path, plugins: &[(&str, &str)]) {
        seed_repository_with_log(root, plugins, None)
    }

    /// Like [`seed_repository`], with plugins appending their name to `log`
    /// when run with `post-install`.
    fn seed_repository_with_log(root: &Path, plugins: &[(&str, &str)], log: Option<&Path>) {
        let mut manifest = String::from("coreVersion: v0.28.0\nplugins:\n");
        for (name, version) in plugins {
            manifest.push_str(&format!("  - name: {}\n", name));

            let dir = root.join(name);
            fs::create_dir_all(dir.join(version)).unwrap();
            fs::write(
                dir.join("plugin.yaml"),
                format!("name: {}\ndescription: {} plugin\n", name, name),
            )
            .unwrap();
            fs::write(
                dir.join(version).join(ARCH.artifact_name(name)),
                plugin_script(name, version, log),
            )
            .unwrap();
        }
        fs::write(root.join("manifest.yaml"), manifest).unwrap();
    }

    fn names(catalog_list: Vec<tanzu::plugins::PluginDescriptor>) -> Vec<String> {
        catalog_list.into_iter().map(|d| d.name).collect()
    }

    #[tokio::test]
    async fn test_install_all_list_then_delete() {
        let repo_dir = tempdir().unwrap();
        seed_repository(
            repo_dir.path(),
            &[("foo", "v1.0.0"), ("bar", "v2.0.0"), ("baz", "v3.0.0")],
        );
        let repo: Arc<dyn Repository> = Arc::new(LocalRepository::new("local", repo_dir.path()));

        let root = tempdir().unwrap();
        let catalog = Catalog::with_arch(root.path(), Vec::new(), ARCH).unwrap();

        catalog.install_all(repo).await.unwrap();
        let installed = catalog.list().await.unwrap();
        assert_eq!(names(installed.clone()), vec!["bar", "baz", "foo"]);

        let foo = installed.iter().find(|d| d.name == "foo").unwrap();
        assert_eq!(foo.version, "v1.0.0");
        assert_eq!(foo.build_sha, "abc123");

        let (stdout, _) = catalog
            .runner("bar", vec!["hello".into()])
            .run_output()
            .await
            .unwrap();
        assert_eq!(stdout.trim(), "bar hello");

        catalog.delete("foo").await.unwrap();
        assert_eq!(names(catalog.list().await.unwrap()), vec!["bar", "baz"]);
        assert!(catalog.describe("foo").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_ensure_distro_twice_is_idempotent() {
        let first_dir = tempdir().unwrap();
        seed_repository(first_dir.path(), &[("login", "v0.1.0")]);
        let second_dir = tempdir().unwrap();
        seed_repository(second_dir.path(), &[("login", "v0.9.0"), ("package", "v0.2.0")]);

        let repos = MultiRepo::new(vec![
            Arc::new(LocalRepository::new("first", first_dir.path())),
            Arc::new(LocalRepository::new("second", second_dir.path())),
        ]);

        let root = tempdir().unwrap();
        let catalog = Catalog::with_arch(
            root.path(),
            vec!["login".to_string(), "package".to_string()],
            ARCH,
        )
        .unwrap();

        catalog.ensure_distro(&repos).await.unwrap();
        let first = catalog.list().await.unwrap();
        assert!(catalog.is_distribution_satisfied(&first));

        let login = first.iter().find(|d| d.name == "login").unwrap();
        assert_eq!(login.version, "v0.1.0");

        catalog.ensure_distro(&repos).await.unwrap();
        assert_eq!(catalog.list().await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_ensure_distro_with_missing_artifact_fails() {
        let repo_dir = tempdir().unwrap();
        seed_repository(repo_dir.path(), &[("login", "v0.1.0"), ("secret", "v0.1.0")]);
        fs::remove_file(
            repo_dir
                .path()
                .join("secret")
                .join("v0.1.0")
                .join(ARCH.artifact_name("secret")),
        )
        .unwrap();
        let repos = MultiRepo::new(vec![Arc::new(LocalRepository::new("local", repo_dir.path()))]);

        let root = tempdir().unwrap();
        let catalog = Catalog::with_arch(
            root.path(),
            vec!["login".to_string(), "secret".to_string()],
            ARCH,
        )
        .unwrap();

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            catalog.ensure_distro(&repos),
        )
        .await
        .expect("ensure_distro must finish");
        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_install_runs_post_install() {
        let repo_dir = tempdir().unwrap();
        let log = repo_dir.path().join("post-install.log");
        seed_repository_with_log(repo_dir.path(), &[("login", "v0.1.0")], Some(&log));
        let repo = LocalRepository::new("local", repo_dir.path());

        let root = tempdir().unwrap();
        let catalog = Catalog::with_arch(root.path(), Vec::new(), ARCH).unwrap();
        catalog.install("login", "v0.1.0", &repo).await.unwrap();
        catalog.upgrade("login", "v0.1.0", &repo).await.unwrap();

        let logged = fs::read_to_string(&log).unwrap();
        assert_eq!(logged.lines().collect::<Vec<_>>(), vec!["login", "login"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_plugin_installed_concurrently() {
        let repo_dir = tempdir().unwrap();
        seed_repository(repo_dir.path(), &[("foo", "v1.0.0")]);
        let artifact = repo_dir
            .path()
            .join("foo")
            .join("v1.0.0")
            .join(ARCH.artifact_name("foo"));
        let mut script = fs::read_to_string(&artifact).unwrap();
        script.push_str(&format!("# {}\n", "x".repeat(8 * 1024 * 1024)));
        fs::write(&artifact, script).unwrap();
        let repo: Arc<dyn Repository> = Arc::new(LocalRepository::new("local", repo_dir.path()));

        let root = tempdir().unwrap();
        let catalog = Catalog::with_arch(root.path(), vec!["foo".to_string(); 3], ARCH)
            .unwrap()
            .with_max_concurrent(3);

        let mut installs = Vec::new();
        for _ in 0..3 {
            let catalog = catalog.clone();
            let repo = repo.clone();
            installs.push(tokio::spawn(async move {
                catalog.install("foo", "v1.0.0", repo.as_ref()).await
            }));
        }
        for install in installs {
            install.await.unwrap().unwrap();
        }

        let repos = MultiRepo::new(vec![repo]);
        catalog.ensure_distro(&repos).await.unwrap();
        assert_eq!(names(catalog.list().await.unwrap()), vec!["foo"]);
    }
}
