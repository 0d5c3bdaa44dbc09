use std::path::PathBuf;

use super::credentials::SheetsCredentials;
use super::drivers::cake::CakeDriver;
use super::drivers::csv_file::CsvDriver;
use super::drivers::lrs::LrsDriver;
use super::drivers::yourator::YouratorDriver;
use super::drivers::SourceDriver;
use super::errors::ImportError;
use super::models::Source;

/// Source-specific construction options. File-backed sources take a path;
/// spreadsheet-backed sources take the credentials discovered at startup.
#[derive(Debug, Default)]
pub struct DriverOptions {
    pub file_path: Option<PathBuf>,
    pub credentials: Option<SheetsCredentials>,
}

/// Build the driver for a source name. Unknown names fail without
/// constructing anything.
pub fn create(
    source_name: &str,
    client: reqwest::Client,
    options: DriverOptions,
) -> Result<Box<dyn SourceDriver>, ImportError> {
    let source: Source = source_name.parse()?;

    let driver: Box<dyn SourceDriver> = match source {
        Source::Lrs => Box::new(LrsDriver::new(client, options.credentials)),
        Source::Cake => Box::new(CakeDriver::new(client, options.credentials)),
        Source::Yourator => Box::new(YouratorDriver::new(options.file_path)),
        Source::Csv => {
            let file_path = options.file_path.ok_or_else(|| {
                ImportError::InvalidRequest(
                    "--file-path is required for the csv source".to_string(),
                )
            })?;
            Box::new(CsvDriver::new(file_path))
        }
    };

    Ok(driver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_sources_produce_drivers() {
        let client = reqwest::Client::new();

        for (name, options) in [
            ("lrs", DriverOptions::default()),
            ("cake", DriverOptions::default()),
            ("yourator", DriverOptions::default()),
            (
                "csv",
                DriverOptions {
                    file_path: Some(PathBuf::from("candidates.csv")),
                    credentials: None,
                },
            ),
        ] {
            let driver = create(name, client.clone(), options).unwrap();
            assert_eq!(driver.source().as_str(), name);
        }
    }

    #[test]
    fn unknown_source_fails_without_a_driver() {
        let err = create("linkedin", reqwest::Client::new(), DriverOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, ImportError::UnknownSource { .. }));
    }

    #[test]
    fn csv_requires_a_file_path() {
        let err = create("csv", reqwest::Client::new(), DriverOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, ImportError::InvalidRequest(_)));
    }
}
