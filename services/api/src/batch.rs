use crate::infra::{build_catalog_service, load_seed, CatalogService};
use appcatalog::catalog::ImportReport;
use appcatalog::config::AppConfig;
use appcatalog::error::AppError;
use appcatalog::telemetry;
use clap::Args;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// CSV file in the catalog export layout
    pub(crate) csv: PathBuf,
    /// JSON file with the organizations, users and data sources to resolve against
    #[arg(long)]
    pub(crate) seed: Option<PathBuf>,
    /// Write the imported catalog back out as CSV
    #[arg(long)]
    pub(crate) export: Option<PathBuf>,
    /// Print the import report as JSON instead of a summary
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let ImportArgs {
        csv,
        seed,
        export,
        json,
    } = args;

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry, config.environment)?;

    let seed_path = seed.or(config.catalog.seed_path);
    let service = build_catalog_service(load_seed(seed_path.as_deref())?);

    let report = import_file(&service, &csv)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in report_lines(&csv, &report) {
            println!("{line}");
        }
    }

    if let Some(path) = export {
        service.export_csv(File::create(&path)?)?;
        if !json {
            println!("Catalog written to {}", path.display());
        }
    }

    Ok(())
}

pub(crate) fn import_file(service: &CatalogService, path: &Path) -> Result<ImportReport, AppError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(service.import_csv(reader)?)
}

pub(crate) fn report_lines(path: &Path, report: &ImportReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Imported {} application(s) from {}",
        report.imported.len(),
        path.display()
    )];
    if !report.rejected.is_empty() {
        lines.push(format!("Rejected {} row(s):", report.rejected.len()));
        for rejection in &report.rejected {
            lines.push(format!("  - line {}: {}", rejection.line, rejection.error));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::parse_seed;
    use appcatalog::catalog::{ApplicationId, ImportRejection};

    const SEED: &str = r#"{
        "organizations": [{"id": 1, "value": "Insee"}],
        "users": [{"id": 1, "email": "anne.dupont@insee.fr", "first_name": "Anne", "last_name": "Dupont"}]
    }"#;

    fn write_csv(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "appcatalog-api-{}-{name}.csv",
            std::process::id()
        ));
        std::fs::write(&path, content).expect("csv written");
        path
    }

    #[test]
    fn import_file_reads_every_row() {
        let service = build_catalog_service(parse_seed(SEED).expect("seed parses"));
        let path = write_csv(
            "rows",
            "name,goals,organization_name,owners\n\
             Sirene,Identifier les établissements,Insee,anne.dupont@insee.fr\n\
             Esane,Mesurer,Insee,inconnu@insee.fr\n",
        );

        let report = import_file(&service, &path).expect("import runs");
        std::fs::remove_file(&path).ok();

        assert_eq!(report.imported, vec![ApplicationId(1)]);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].line, 2);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let service = build_catalog_service(parse_seed(SEED).expect("seed parses"));
        let path = std::env::temp_dir().join("appcatalog-api-absent.csv");
        let error = import_file(&service, &path).expect_err("file missing");
        assert!(matches!(error, AppError::Io(_)));
    }

    #[test]
    fn report_lines_list_rejections() {
        let report = ImportReport {
            imported: vec![ApplicationId(1), ApplicationId(2)],
            rejected: vec![ImportRejection {
                line: 3,
                error: "Veuillez saisir un url valide".to_string(),
            }],
        };

        let lines = report_lines(Path::new("catalogue.csv"), &report);
        assert_eq!(
            lines,
            vec![
                "Imported 2 application(s) from catalogue.csv".to_string(),
                "Rejected 1 row(s):".to_string(),
                "  - line 3: Veuillez saisir un url valide".to_string(),
            ]
        );
    }

    #[test]
    fn clean_report_is_a_single_line() {
        let lines = report_lines(Path::new("vide.csv"), &ImportReport::default());
        assert_eq!(lines, vec!["Imported 0 application(s) from vide.csv"]);
    }
}
