use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_path: PathBuf,
    pub output_directory: PathBuf,
    pub background_template_path: PathBuf,
    pub font_dir: Option<PathBuf>,
    pub font_family: Option<String>,
    pub host: String,
    pub port: u16,
    pub startup_delay: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        dotenvy::dotenv().ok();

        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let database_path = base_dir.join(
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "certificates.db".to_string()),
        );
        let output_directory = base_dir.join(
            std::env::var("OUTPUT_DIR").unwrap_or_else(|_| "certificates_pdfs".to_string()),
        );
        let background_template_path = base_dir.join(
            std::env::var("BACKGROUND_TEMPLATE").unwrap_or_else(|_| "template.png".to_string()),
        );

        let font_dir = std::env::var("FONT_DIR").ok().map(|d| base_dir.join(d));
        let font_family = std::env::var("FONT_FAMILY")
            .ok()
            .filter(|f| !f.trim().is_empty());

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "5002".to_string())
            .parse()
            .map_err(|_| "PORT must be a valid port number")?;

        let startup_delay_ms: u64 = std::env::var("STARTUP_DELAY_MS")
            .unwrap_or_else(|_| "2000".to_string())
            .parse()
            .unwrap_or(2000);

        Ok(Self {
            database_path,
            output_directory,
            background_template_path,
            font_dir,
            font_family,
            host,
            port,
            startup_delay: Duration::from_millis(startup_delay_ms),
        })
    }

    /// Paths only, everything else defaulted. Used where no environment is wanted.
    pub fn with_paths(database_path: PathBuf, output_directory: PathBuf) -> Self {
        let background_template_path = database_path.with_file_name("template.png");
        Self {
            database_path,
            output_directory,
            background_template_path,
            font_dir: None,
            font_family: None,
            host: "127.0.0.1".to_string(),
            port: 5002,
            startup_delay: Duration::ZERO,
        }
    }
}
