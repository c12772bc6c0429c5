use bank_reviews::config::{PathsConfig, PipelineConfig};
use bank_reviews::dataset::{group_counts, read_csv, text_column};
use bank_reviews::error::PipelineError;
use bank_reviews::preprocess::language::Detection;
use bank_reviews::preprocess::{self, GroupAction, LanguageDetector};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Text starting with "[am]" is Amharic, text starting with "??" is unknown,
/// everything else is English
struct PrefixDetector;

impl LanguageDetector for PrefixDetector {
    fn detect(&self, text: &str) -> Option<Detection> {
        if text.starts_with("??") {
            return None;
        }
        let lang = if text.starts_with("[am]") { "amh" } else { "eng" };
        Some(Detection {
            lang: lang.to_string(),
            confidence: 0.9,
            reliable: true,
        })
    }
}

fn test_config(dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.paths = PathsConfig::under(&dir.join("data"), &dir.join("reports"));
    config.sampling.min_per_group = 3;
    config.sampling.max_per_group = 5;
    config
}

/// Raw snapshot in the scraper's column naming
fn write_raw_snapshot(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(path.parent().ok_or("no parent")?)?;
    let mut csv = String::from("review_text,score,at,bank_name,app_name\n");
    for i in 0..8 {
        csv.push_str(&format!(
            "CBE review number {},{},2024-0{}-1{} 08:30:00,CBE,Commercial Bank of Ethiopia\n",
            i,
            i % 5 + 1,
            i % 9 + 1,
            i
        ));
    }
    csv.push_str("Transfers are quick,5,2024-02-01,BOA,Bank of Abyssinia\n");
    csv.push_str("Transfers are quick,5,2024-02-01,BOA,Bank of Abyssinia\n");
    csv.push_str("Login fails often,1,2024-02-03,BOA,Bank of Abyssinia\n");
    csv.push_str("[am] betam tiru new,4,2024-02-04,BOA,Bank of Abyssinia\n");
    csv.push_str("?? 👍👍,5,2024-02-05,BOA,Bank of Abyssinia\n");
    csv.push_str("No rating here,,2024-02-06,BOA,Bank of Abyssinia\n");
    csv.push_str("Bad date,3,someday,Dashen,Dashen Bank\n");
    csv.push_str("Works well,4.0,2024-03-07T10:00:00Z,Dashen,Dashen Bank\n");
    fs::write(path, csv)?;
    Ok(())
}

#[test]
fn test_preprocess_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let config = test_config(dir.path());
    write_raw_snapshot(&config.paths.raw_file)?;

    let report = preprocess::run(&config, &PrefixDetector)?;

    assert_eq!(report.cleaning.rows_in, 16);
    assert_eq!(report.cleaning.missing_removed, 1);
    assert_eq!(report.cleaning.bad_dates_removed, 1);
    assert_eq!(report.cleaning.duplicates_removed, 1);
    assert_eq!(report.language.dropped, 2);
    assert!(report.all_within_max());

    let cbe = report.groups.iter().find(|g| g.group == "CBE").ok_or("CBE missing")?;
    assert_eq!(cbe.rows_in, 8);
    assert_eq!(cbe.rows_out, 5);
    assert_eq!(cbe.action, GroupAction::Sampled);

    let boa = report.groups.iter().find(|g| g.group == "BOA").ok_or("BOA missing")?;
    assert_eq!(boa.rows_out, 2);
    assert_eq!(boa.action, GroupAction::BelowMinimum);

    let processed = read_csv(&config.paths.processed_file)?;
    assert_eq!(processed.height(), 8);
    assert_eq!(
        group_counts(&processed, "bank")?,
        vec![
            ("CBE".to_string(), 5),
            ("BOA".to_string(), 2),
            ("Dashen".to_string(), 1)
        ]
    );

    let dates = text_column(&processed, "date")?;
    for date in dates.into_iter().flatten() {
        assert_eq!(date.len(), 10, "date not normalized: {}", date);
    }
    let ratings = text_column(&processed, "rating")?;
    assert!(ratings.into_iter().flatten().all(|r| ["1", "2", "3", "4", "5"].contains(&r)));

    let texts = text_column(&processed, "review")?;
    let unique: HashSet<_> = texts.into_iter().flatten().collect();
    assert_eq!(unique.len(), 8);
    assert!(!unique.contains("[am] betam tiru new"));
    Ok(())
}

#[test]
fn test_same_seed_same_output() -> Result<(), Box<dyn std::error::Error>> {
    let first = tempfile::tempdir()?;
    let second = tempfile::tempdir()?;

    for dir in [&first, &second] {
        let config = test_config(dir.path());
        write_raw_snapshot(&config.paths.raw_file)?;
        preprocess::run(&config, &PrefixDetector)?;
    }

    let a = fs::read_to_string(test_config(first.path()).paths.processed_file)?;
    let b = fs::read_to_string(test_config(second.path()).paths.processed_file)?;
    assert_eq!(a, b);
    Ok(())
}

#[test]
fn test_missing_required_column_halts() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let config = test_config(dir.path());
    fs::create_dir_all(config.paths.raw_file.parent().ok_or("no parent")?)?;
    fs::write(&config.paths.raw_file, "content,score,bank\nGreat,5,CBE\n")?;

    let result = preprocess::run(&config, &PrefixDetector);
    assert!(matches!(result, Err(PipelineError::Schema(_))));
    assert!(!config.paths.processed_file.exists());
    Ok(())
}

#[test]
fn test_missing_raw_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    assert!(matches!(
        preprocess::run(&config, &PrefixDetector),
        Err(PipelineError::Io(_))
    ));
}
