use crate::cancel::Context;
use crate::cert::{CertificateMatcher, CertificateMaterial, MaterialField};
use crate::cli::args::*;
use crate::cli::completions::{handle_completion_command, handle_completion_helper_command};
use crate::config::EngineConfig;
use crate::registry::options::insert_pair;
use crate::registry::{default_registry, ConfigMap, ProviderOptions};
use crate::storage::{
    ArchiveFormat, CertificateRecord, CertificateRepository, CertificateService, CertificateSource,
    MemoryRepository,
};
use crate::utils::errors::{CertimateError, Result};
use crate::utils::output::{GetColumnValue, OutputFormat};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub async fn handle_command(cli: Cli) -> Result<()> {
    // Initialize logging - always to stderr
    if !cli.quiet {
        let log_level = match cli.verbose {
            0 => "certimate_rs=warn",
            1 => "certimate_rs=info",
            2 => "certimate_rs=debug",
            _ => "certimate_rs=trace",
        };

        tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_env_filter(log_level)
            .init();
    }

    let output = OutputFormat::new(cli.raw);

    let ctx = Context::new();
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling");
            interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Inspect { ref file, ref key } => handle_inspect(file, key.as_deref(), &output),
        Commands::Compare {
            ref a,
            ref b,
            leaf,
        } => handle_compare(a, b, leaf),
        Commands::Validate { ref command } => handle_validate(command),
        Commands::Export {
            ref file,
            ref key,
            ref format,
            ref output_dir,
        } => handle_export(file, key, format, output_dir).await.map(|path| {
            println!("{}", path.display());
        }),
        Commands::Providers => handle_providers(&output),
        Commands::Notify {
            ref provider,
            ref options,
            timeout,
            ref subject,
            ref body,
        } => {
            let ctx = ctx.with_timeout(Duration::from_secs(timeout));
            handle_notify(&ctx, provider, options, subject, body).await
        }
        Commands::Config { ref command } => handle_config_command(command, &cli),
        Commands::Completion { ref command } => handle_completion_command(command),
        Commands::CompletionHelper { ref command } => {
            handle_completion_helper_command(command, &output)
        }
    }
}

fn read_pem(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        CertimateError::InvalidInput(format!("failed to read {}: {e}", path.display()))
    })
}

fn handle_inspect(file: &Path, key: Option<&Path>, output: &OutputFormat) -> Result<()> {
    let chain = read_pem(file)?;
    let key_pem = match key {
        Some(path) => {
            let pem = read_pem(path)?;
            CertificateService::validate_private_key(&pem)?;
            pem
        }
        None => String::new(),
    };

    let material = CertificateMaterial::from_pem(&chain, &key_pem)?;
    debug!("Parsed {}", material);

    let mut pairs: Vec<(String, String)> = MaterialField::ALL
        .iter()
        .map(|field| (field.header().to_string(), material.get_column_value(field)))
        .collect();
    pairs.push((
        "SHA256 Fingerprint".to_string(),
        material.fingerprint_sha256()?,
    ));
    pairs.push((
        "Chain".to_string(),
        if material.issuer_pem().is_empty() {
            "leaf only".to_string()
        } else {
            "leaf + intermediates".to_string()
        },
    ));
    output.print_key_value(&pairs);
    Ok(())
}

fn handle_compare(a: &Path, b: &Path, leaf: bool) -> Result<()> {
    let pem_a = read_pem(a)?;
    let pem_b = read_pem(b)?;
    let same = if leaf {
        CertificateMatcher::equal_leaf(&pem_a, &pem_b)
    } else {
        CertificateMatcher::equal(&pem_a, &pem_b)
    };

    if same {
        println!("same");
        Ok(())
    } else {
        Err(CertimateError::InvalidInput(format!(
            "{} and {} hold different certificates",
            a.display(),
            b.display()
        )))
    }
}

async fn handle_export(
    file: &Path,
    key: &Path,
    format: &str,
    output_dir: &Path,
) -> Result<PathBuf> {
    let format: ArchiveFormat = format.parse()?;
    let key_pem = read_pem(key)?;
    CertificateService::validate_private_key(&key_pem)?;
    let material = CertificateMaterial::from_pem(&read_pem(file)?, &key_pem)?;

    let repo = Arc::new(MemoryRepository::new());
    let saved = repo
        .save(CertificateRecord::from_material(CertificateSource::Upload, &material))
        .await?;
    let archive = CertificateService::new(repo.clone(), repo)
        .archive(&saved.id, format)
        .await?;

    let stem = material
        .subject_alt_names()
        .first()
        .cloned()
        .unwrap_or_else(|| material.serial_number().to_string());
    let path = output_dir.join(format!("{}.{}", sanitize_filename(&stem), archive.file_format));
    fs::create_dir_all(output_dir)?;
    fs::write(&path, &archive.file_bytes)?;
    info!("Exported {} to {}", material, path.display());
    Ok(path)
}

fn sanitize_filename(name: &str) -> String {
    name.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_")
}

fn handle_validate(command: &ValidateCommands) -> Result<()> {
    match command {
        ValidateCommands::Cert { file } => {
            let domains = CertificateService::validate_certificate(&read_pem(file)?)?;
            println!("{domains}");
        }
        ValidateCommands::Key { file } => {
            CertificateService::validate_private_key(&read_pem(file)?)?;
            println!("ok");
        }
    }
    Ok(())
}

fn handle_providers(output: &OutputFormat) -> Result<()> {
    let registry = default_registry()?;
    let data: Vec<Vec<String>> = std::iter::once(vec!["Kind".to_string(), "Provider".to_string()])
        .chain(
            registry
                .providers()
                .into_iter()
                .map(|(kind, id)| vec![kind.to_string(), id]),
        )
        .collect();
    output.print_table(&data);
    Ok(())
}

async fn handle_notify(
    ctx: &Context,
    provider: &str,
    options: &[String],
    subject: &str,
    body: &str,
) -> Result<()> {
    let mut access_config = ConfigMap::new();
    for pair in options {
        insert_pair(&mut access_config, pair)?;
    }

    let registry = default_registry()?;
    let notifier = registry.notifier(
        provider,
        &ProviderOptions::new(access_config, ConfigMap::new()),
    )?;

    info!("Sending notification through '{}'", provider);
    notifier.send(ctx, subject, body).await?;
    println!("Notification sent");
    Ok(())
}

fn handle_config_command(command: &ConfigCommands, cli: &Cli) -> Result<()> {
    let path = EngineConfig::resolve_path(cli.config.as_deref())?;
    match command {
        ConfigCommands::Show => {
            let config = EngineConfig::load(&path)?;
            print!("{}", config.to_yaml()?);
        }
        ConfigCommands::Path => println!("{}", path.display()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::material::testing::leaf_pem;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_compare_same_file_content() {
        let dir = TempDir::new().unwrap();
        let pem = leaf_pem("a.example.com", &["a.example.com"], 2099);
        let a = write(&dir, "a.pem", &pem);
        let b = write(&dir, "b.pem", &format!("\n{pem}\n"));
        assert!(handle_compare(&a, &b, false).is_ok());
    }

    #[test]
    fn test_compare_different_certificates_fails() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.pem", &leaf_pem("a.example.com", &["a.example.com"], 2099));
        let b = write(&dir, "b.pem", &leaf_pem("b.example.com", &["b.example.com"], 2099));
        assert!(matches!(
            handle_compare(&a, &b, true),
            Err(CertimateError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_inspect_accepts_chain_and_key() {
        let dir = TempDir::new().unwrap();
        let chain = write(&dir, "chain.pem", &leaf_pem("a.example.com", &["a.example.com"], 2099));
        let key_pem = rcgen::KeyPair::generate().unwrap().serialize_pem();
        let key = write(&dir, "key.pem", &key_pem);
        assert!(handle_inspect(&chain, Some(&key), &OutputFormat::new(true)).is_ok());
    }

    #[tokio::test]
    async fn test_export_writes_pem_archive() {
        let dir = TempDir::new().unwrap();
        let chain_pem = leaf_pem("*.example.com", &["*.example.com"], 2099);
        let chain = write(&dir, "chain.pem", &chain_pem);
        let key = write(&dir, "key.pem", &rcgen::KeyPair::generate().unwrap().serialize_pem());
        let out = dir.path().join("out");

        let path = handle_export(&chain, &key, "pem", &out).await.unwrap();
        assert_eq!(path, out.join("_.example.com.zip"));

        let bytes = fs::read(&path).unwrap();
        let mut bundle = zip::ZipArchive::new(io::Cursor::new(bytes)).unwrap();
        let mut stored = String::new();
        io::Read::read_to_string(&mut bundle.by_name("certbundle.pem").unwrap(), &mut stored)
            .unwrap();
        assert!(CertificateMatcher::equal(&stored, &chain_pem));
        assert!(bundle.by_name("privkey.pem").is_ok());
    }

    #[tokio::test]
    async fn test_export_rejects_unsupported_format() {
        let dir = TempDir::new().unwrap();
        let chain = write(&dir, "chain.pem", &leaf_pem("a.example.com", &["a.example.com"], 2099));
        let key = write(&dir, "key.pem", &rcgen::KeyPair::generate().unwrap().serialize_pem());
        let err = handle_export(&chain, &key, "JKS", dir.path()).await.unwrap_err();
        assert!(matches!(err, CertimateError::InvalidInput(_)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_validate_rejects_missing_file() {
        let err = handle_validate(&ValidateCommands::Key {
            file: "/nonexistent/key.pem".into(),
        })
        .unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[tokio::test]
    async fn test_notify_unknown_provider() {
        let err = handle_notify(&Context::new(), "nope", &[], "s", "b")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported notifier provider 'nope'"));
    }

    #[tokio::test]
    async fn test_notify_rejects_malformed_option() {
        let options = vec!["webhookUrl".to_string()];
        let err = handle_notify(&Context::new(), "wecombot", &options, "s", "b")
            .await
            .unwrap_err();
        assert!(matches!(err, CertimateError::InvalidInput(_)));
    }
}
