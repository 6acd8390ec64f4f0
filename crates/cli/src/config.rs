pub use crate::core::config::*;

use crate::cli::Cli;

pub fn from_cli(cli: &Cli) -> anyhow::Result<AppConfig> {
    AppConfig::discover(cli.data_dir.clone(), cli.api_url.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn flags_override_environment() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");
        let cli = Cli::try_parse_from([
            "teamdesk",
            "--data-dir",
            data_dir.to_str().unwrap(),
            "--api-url",
            "https://desk.example.com/api/",
            "whoami",
        ])
        .unwrap();

        let config = from_cli(&cli).unwrap();

        assert_eq!(config.data_dir(), data_dir.as_path());
        assert!(data_dir.is_dir());
        assert_eq!(config.api_base_url(), "https://desk.example.com/api");
        assert_eq!(config.session_path(), data_dir.join("session.json"));
    }

    #[test]
    fn rejects_non_http_url() {
        let dir = TempDir::new().unwrap();
        let cli = Cli::try_parse_from([
            "teamdesk",
            "--data-dir",
            dir.path().to_str().unwrap(),
            "--api-url",
            "ftp://desk.example.com",
            "whoami",
        ])
        .unwrap();

        assert!(from_cli(&cli).is_err());
    }
}
