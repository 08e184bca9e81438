//! SDK Forge CLI - upload a spec to a running service

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};

const DEFAULT_URL: &str = "http://127.0.0.1:8080";
const FALLBACK_HEADER: &str = "x-forge-language-fallback";
const LANGUAGE_HEADER: &str = "x-forge-language";
const JOB_ID_HEADER: &str = "x-forge-job-id";

#[derive(Parser)]
#[command(name = "forge")]
#[command(about = "SDK Forge CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Service URL
    #[arg(long, env = "FORGE_URL", default_value = DEFAULT_URL)]
    url: String,

    /// API key sent as x-api-key
    #[arg(long, env = "FORGE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an SDK and download the archive
    Generate {
        /// Specification file (OpenAPI YAML or JSON)
        spec: PathBuf,

        /// Target language (typescript, python, java, go, ruby, csharp)
        #[arg(short, long)]
        language: String,

        /// SDK package name
        #[arg(short, long)]
        package: String,

        /// Generator option as key=value (repeatable)
        #[arg(short = 'o', long = "option", value_parser = parse_option)]
        options: Vec<(String, String)>,

        /// Directory to write the archive into
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Validate a specification
    Validate {
        /// Specification file
        spec: PathBuf,

        /// Generator option as key=value (repeatable)
        #[arg(short = 'o', long = "option", value_parser = parse_option)]
        options: Vec<(String, String)>,
    },

    /// Show service status
    Health,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    kind: String,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    diagnostics: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateBody {
    job_id: String,
    valid: bool,
    diagnostics: Vec<String>,
}

#[derive(Tabled)]
struct GenerateResult {
    job_id: String,
    language: String,
    fallback: String,
    size: String,
    archive: String,
}

fn parse_option(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

/// `attachment; filename="acme-go-sdk.tar.gz"` -> `acme-go-sdk.tar.gz`
fn filename_from_disposition(value: &str) -> Option<String> {
    let name = value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))?
        .trim_matches('"');
    // never let the server pick a path outside --out
    let name = Path::new(name).file_name()?.to_str()?.to_string();
    (!name.is_empty()).then_some(name)
}

fn header(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn spec_part(path: &Path) -> Result<Part> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "openapi.yml".to_string());
    Ok(Part::bytes(bytes).file_name(file_name))
}

struct Client {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl Client {
    fn post(&self, path: &str, form: Form) -> reqwest::RequestBuilder {
        let request = self
            .http
            .post(format!("{}{}", self.url.trim_end_matches('/'), path))
            .multipart(form);
        match &self.api_key {
            Some(key) => request.header("x-api-key", key),
            None => request,
        }
    }

    /// Turn a non-2xx response into an error, printing what the service sent
    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => {
                eprintln!("{} {} ({})", "✗".red().bold(), body.error, body.kind.yellow());
                for line in body.diagnostics.unwrap_or_default() {
                    eprintln!("  {}", line);
                }
                if let Some(stderr) = body.stderr.filter(|s| !s.trim().is_empty()) {
                    eprintln!();
                    eprintln!("{}", "Tool stderr:".bold());
                    eprintln!("{}", stderr.trim_end());
                }
            }
            Err(_) => eprintln!("{} {}", "✗".red().bold(), text),
        }
        anyhow::bail!("request failed with status {}", status)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = Client {
        http: reqwest::Client::new(),
        url: cli.url.clone(),
        api_key: cli.api_key.clone(),
    };

    match cli.command {
        Commands::Generate {
            spec,
            language,
            package,
            options,
            out,
        } => {
            let mut form = Form::new()
                .part("spec", spec_part(&spec).await?)
                .text("language", language.clone())
                .text("packageName", package.clone());
            for (key, value) in options {
                form = form.text(key, value);
            }

            println!("{}", format!("Generating {} SDK...", language).cyan().bold());

            let response = client
                .post("/generate", form)
                .send()
                .await
                .context("Failed to connect to service")?;
            let response = client.check(response).await?;

            let file_name = header(&response, "content-disposition")
                .and_then(|v| filename_from_disposition(&v))
                .unwrap_or_else(|| format!("{}-{}-sdk.tar.gz", package, language));
            let job_id = header(&response, JOB_ID_HEADER).unwrap_or_default();
            let resolved = header(&response, LANGUAGE_HEADER).unwrap_or(language);
            let fallback = header(&response, FALLBACK_HEADER).unwrap_or_default();

            let bytes = response.bytes().await.context("Failed to download archive")?;
            tokio::fs::create_dir_all(&out)
                .await
                .with_context(|| format!("Failed to create {}", out.display()))?;
            let path = out.join(&file_name);
            tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;

            if fallback == "true" {
                println!(
                    "{}",
                    format!("! Unsupported language, generated {} instead", resolved).yellow()
                );
            }
            println!("{}", "✓ SDK generated".green().bold());
            println!();

            let table = Table::new(vec![GenerateResult {
                job_id,
                language: resolved,
                fallback,
                size: format!("{:.1} KiB", bytes.len() as f64 / 1024.0),
                archive: path.display().to_string(),
            }])
            .to_string();
            println!("{}", table);
        }

        Commands::Validate { spec, options } => {
            let mut form = Form::new().part("spec", spec_part(&spec).await?);
            for (key, value) in options {
                form = form.text(key, value);
            }

            let response = client
                .post("/validate", form)
                .send()
                .await
                .context("Failed to connect to service")?;
            let body: ValidateBody = client
                .check(response)
                .await?
                .json()
                .await
                .context("Failed to parse response")?;

            if body.valid {
                println!("{} {}", "✓".green().bold(), "Specification is valid".green());
            } else {
                println!("{} {}", "✗".red().bold(), "Specification is invalid".red());
                for line in &body.diagnostics {
                    println!("  {}", line);
                }
            }
            println!("  {} {}", "Job:".bold(), body.job_id);

            if !body.valid {
                std::process::exit(1);
            }
        }

        Commands::Health => {
            println!("{}", "Service Status".cyan().bold());
            println!();

            let result = async {
                client
                    .http
                    .get(format!("{}/health", cli.url.trim_end_matches('/')))
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<serde_json::Value>()
                    .await
            }
            .await;

            match result {
                Ok(health) => {
                    println!("  {} {}", "URL:".bold(), cli.url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!("  {} {}", "Version:".bold(), health["version"]);
                    println!("  {} {}", "Tool:".bold(), health["tool"]);
                    println!("  {} {}", "Workspaces:".bold(), health["workspaceRoot"]);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }
    }

    Ok(())
}
