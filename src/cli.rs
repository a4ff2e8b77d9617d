use clap::Parser;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Output root; a directory named for the run date is created inside.
    #[arg(long, default_value = ".")]
    pub out: String,

    /// Run date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub date: Option<String>,

    /// Path to the file holding the Open Platform API key
    /// (default: ~/.guardian-open-platform-key).
    #[arg(long, env = "GUARDIAN_API_KEY_FILE")]
    pub api_key_file: Option<String>,

    /// Content API base URL.
    #[arg(long, default_value = "https://content.guardianapis.com")]
    pub api_base: String,

    /// Daily index page URL (defaults to the paper's "all stories" page).
    #[arg(long)]
    pub index_url: Option<String>,

    /// Directory containing the paper logo images.
    #[arg(long, default_value = ".")]
    pub logo_dir: String,

    /// Delay after every live network request (API rate limit).
    #[arg(long, default_value_t = 2000)]
    pub delay_ms: u64,

    /// kindlegen binary used for the optional .mobi conversion.
    #[arg(long, default_value = "kindlegen")]
    pub kindlegen: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied() {
        let cli = Cli::parse_from(["paperbound"]);
        assert_eq!(cli.out, ".");
        assert_eq!(cli.api_base, "https://content.guardianapis.com");
        assert_eq!(cli.delay_ms, 2000);
        assert_eq!(cli.kindlegen, "kindlegen");
        assert!(cli.date.is_none());
        assert!(cli.index_url.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let cli = Cli::parse_from([
            "paperbound",
            "--out",
            "/tmp/editions",
            "--date",
            "2026-08-07",
            "--delay-ms",
            "0",
        ]);
        assert_eq!(cli.out, "/tmp/editions");
        assert_eq!(cli.date.as_deref(), Some("2026-08-07"));
        assert_eq!(cli.delay_ms, 0);
    }
}
