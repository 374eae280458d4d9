//! Integration tests for Javelin

mod cli_tests {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use tempfile::TempDir;

    fn javelin() -> Command {
        Command::cargo_bin("javelin").unwrap()
    }

    /// A file:// Maven repository, a project directory and an isolated
    /// config/cache, wired together through JAVELIN_CONFIG.
    struct Workspace {
        repo: TempDir,
        project: TempDir,
        state: TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            let ws = Self {
                repo: TempDir::new().unwrap(),
                project: TempDir::new().unwrap(),
                state: TempDir::new().unwrap(),
            };
            std::fs::write(
                ws.config_path(),
                format!(
                    "[cache]\ndir = \"{}\"\n\n[network]\nmax_parallel = 4\n\n[repositories]\n",
                    ws.state.path().join("cache").display()
                ),
            )
            .unwrap();
            ws
        }

        fn config_path(&self) -> std::path::PathBuf {
            self.state.path().join("config.toml")
        }

        fn publish(&self, group: &str, artifact: &str, version: &str, pom_deps: &str) {
            let dir = self
                .repo
                .path()
                .join(group.replace('.', "/"))
                .join(artifact)
                .join(version);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(
                dir.join(format!("{artifact}-{version}.pom")),
                format!(
                    "<project><groupId>{group}</groupId><artifactId>{artifact}</artifactId><version>{version}</version>{pom_deps}</project>"
                ),
            )
            .unwrap();
            std::fs::write(
                dir.join(format!("{artifact}-{version}.jar")),
                format!("jar bytes of {group}:{artifact}:{version}"),
            )
            .unwrap();
        }

        fn write_manifest(&self, dependencies: &str) {
            std::fs::write(
                self.project.path().join("javelin.toml"),
                format!(
                    "[project]\nname = \"demo\"\nversion = \"1.0.0\"\n\n[repositories]\nlocal = \"file://{}\"\n\n{}",
                    self.repo.path().display(),
                    dependencies
                ),
            )
            .unwrap();
        }

        fn cmd(&self, args: &[&str]) -> Command {
            let mut cmd = javelin();
            cmd.args(args)
                .current_dir(self.project.path())
                .env("JAVELIN_CONFIG", self.config_path())
                .env("CI", "1");
            cmd
        }

        fn project_file(&self, rel: &str) -> std::path::PathBuf {
            self.project.path().join(rel)
        }
    }

    #[test]
    fn help_displays() {
        javelin()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Fast Java dependency manager"));
    }

    #[test]
    fn version_displays() {
        javelin()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("javelin"));
    }

    #[test]
    fn install_without_manifest_fails_with_hint() {
        let dir = TempDir::new().unwrap();
        javelin()
            .arg("install")
            .current_dir(dir.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("javelin.toml"));
    }

    #[test]
    fn add_rejects_malformed_coordinate() {
        let ws = Workspace::new();
        ws.write_manifest("[dependencies]\n");
        ws.cmd(&["add", "not-a-coordinate"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("group:artifact:version"));
    }

    #[test]
    fn install_writes_lock_and_lib() {
        let ws = Workspace::new();
        ws.publish(
            "com.example",
            "app-core",
            "1.0",
            "<dependencies><dependency><groupId>org.slf4j</groupId><artifactId>slf4j-api</artifactId><version>2.0.13</version></dependency></dependencies>",
        );
        ws.publish("org.slf4j", "slf4j-api", "2.0.13", "");
        ws.write_manifest("[dependencies]\n\"com.example:app-core\" = \"1.0\"\n");

        ws.cmd(&["install"]).assert().success();

        assert!(ws.project_file("javelin.lock").exists());
        assert!(ws.project_file("lib/app-core-1.0.jar").exists());
        assert!(ws.project_file("lib/slf4j-api-2.0.13.jar").exists());

        let lock = std::fs::read_to_string(ws.project_file("javelin.lock")).unwrap();
        assert!(lock.contains("fingerprint = \"sha256:"));
        assert!(lock.contains("slf4j-api"));
    }

    #[test]
    fn second_install_reuses_lock() {
        let ws = Workspace::new();
        ws.publish("com.example", "lib", "1.0", "");
        ws.write_manifest("[dependencies]\n\"com.example:lib\" = \"1.0\"\n");

        ws.cmd(&["install"]).assert().success();
        let first = std::fs::read(ws.project_file("javelin.lock")).unwrap();

        ws.cmd(&["install"])
            .assert()
            .success()
            .stdout(predicate::str::contains("from lock"));
        assert_eq!(std::fs::read(ws.project_file("javelin.lock")).unwrap(), first);
    }

    #[test]
    fn production_install_skips_test_dependencies() {
        let ws = Workspace::new();
        ws.publish("com.example", "lib", "1.0", "");
        ws.publish("junit", "junit", "4.13.2", "");
        ws.write_manifest(
            "[dependencies]\n\"com.example:lib\" = \"1.0\"\n\n[test-dependencies]\n\"junit:junit\" = \"4.13.2\"\n",
        );

        ws.cmd(&["install", "--production"]).assert().success();

        assert!(ws.project_file("lib/lib-1.0.jar").exists());
        assert!(!ws.project_file("lib/junit-4.13.2.jar").exists());
    }

    #[test]
    fn add_then_remove_roundtrip() {
        let ws = Workspace::new();
        ws.publish("com.example", "lib", "1.0", "");
        ws.publish("junit", "junit", "4.13.2", "");
        ws.write_manifest("[dependencies]\n\"com.example:lib\" = \"1.0\"\n");

        ws.cmd(&["add", "junit:junit:4.13.2", "--scope", "test"])
            .assert()
            .success();
        let manifest = std::fs::read_to_string(ws.project_file("javelin.toml")).unwrap();
        assert!(manifest.contains("[test-dependencies]"));
        assert!(manifest.contains("\"junit:junit\" = \"4.13.2\""));

        ws.cmd(&["remove", "junit:junit"]).assert().success();
        let manifest = std::fs::read_to_string(ws.project_file("javelin.toml")).unwrap();
        assert!(!manifest.contains("junit"));
    }

    #[test]
    fn remove_unknown_dependency_fails() {
        let ws = Workspace::new();
        ws.write_manifest("[dependencies]\n");
        ws.cmd(&["remove", "no.such:artifact"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not declared"));
    }

    #[test]
    fn tree_prints_transitive_dependencies() {
        let ws = Workspace::new();
        ws.publish(
            "com.example",
            "app-core",
            "1.0",
            "<dependencies><dependency><groupId>org.slf4j</groupId><artifactId>slf4j-api</artifactId><version>2.0.13</version></dependency></dependencies>",
        );
        ws.publish("org.slf4j", "slf4j-api", "2.0.13", "");
        ws.write_manifest("[dependencies]\n\"com.example:app-core\" = \"1.0\"\n");

        ws.cmd(&["tree", "--transitive"])
            .assert()
            .success()
            .stdout(
                predicate::str::contains("com.example:app-core:1.0")
                    .and(predicate::str::contains("org.slf4j:slf4j-api:2.0.13")),
            );

        // without --transitive only direct dependencies appear
        ws.cmd(&["tree"])
            .assert()
            .success()
            .stdout(predicate::str::contains("slf4j-api").not());
    }

    #[test]
    fn missing_artifact_reports_repositories() {
        let ws = Workspace::new();
        ws.write_manifest("[dependencies]\n\"no.such:artifact\" = \"1.0\"\n");

        ws.cmd(&["install"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not found in any repository"));
    }

    #[test]
    fn update_latest_bumps_manifest_pin() {
        let ws = Workspace::new();
        ws.publish("com.example", "lib", "1.0", "");
        ws.publish("com.example", "lib", "1.2", "");
        let metadata_dir = ws.repo.path().join("com/example/lib");
        std::fs::write(
            metadata_dir.join("maven-metadata.xml"),
            "<metadata><versioning><versions><version>1.0</version><version>1.2</version></versions></versioning></metadata>",
        )
        .unwrap();
        ws.write_manifest("[dependencies]\n\"com.example:lib\" = \"1.0\"\n");

        ws.cmd(&["update", "com.example:lib", "--latest"])
            .assert()
            .success();

        let manifest = std::fs::read_to_string(ws.project_file("javelin.toml")).unwrap();
        assert!(manifest.contains("\"com.example:lib\" = \"1.2\""));
        assert!(ws.project_file("lib/lib-1.2.jar").exists());
    }
}
