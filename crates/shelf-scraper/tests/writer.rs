use shelf_scraper::writer::{read_dataset, write_dataset, write_records, CsvWriterConfig};
use shelf_scraper::CleanRecord;

fn records() -> Vec<CleanRecord> {
    vec![
        CleanRecord {
            name: "HP 15.6\" Laptop, Silver".into(),
            price: 1049.99,
            rating: 4.6,
            review_count: 1203,
        },
        CleanRecord {
            name: "Lenovo IdeaPad 3".into(),
            price: 549.5,
            rating: 0.0,
            review_count: 0,
        },
    ]
}

#[test]
fn csv_columns_and_quoting() {
    let mut out = vec![];
    let rows = write_records(&mut out, &records(), &CsvWriterConfig::default()).unwrap();

    assert_eq!(2, rows);
    assert_eq!(
        "laptops,prices,ratings,votes\n\
         \"HP 15.6\"\" Laptop, Silver\",1049.99,4.6,1203\n\
         Lenovo IdeaPad 3,549.5,0.0,0\n",
        String::from_utf8(out).unwrap()
    );
}

#[test]
fn empty_dataset_keeps_header() {
    let none: &[CleanRecord] = &[];
    let mut out = vec![];
    let rows = write_records(&mut out, none, &CsvWriterConfig::default()).unwrap();

    assert_eq!(0, rows);
    assert_eq!(
        "laptops,prices,ratings,votes\n",
        String::from_utf8(out).unwrap()
    );
}

#[test]
fn dataset_file_in_new_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("laptops.csv");

    write_dataset(&path, &records(), &CsvWriterConfig::default()).unwrap();

    assert_eq!(records(), read_dataset(&path).unwrap());
}

#[test]
fn custom_delimiter() {
    let config = CsvWriterConfig {
        delimiter: ';',
        ..Default::default()
    };
    let mut out = vec![];
    write_records(&mut out, &records()[1..], &config).unwrap();

    assert_eq!(
        "laptops;prices;ratings;votes\nLenovo IdeaPad 3;549.5;0.0;0\n",
        String::from_utf8(out).unwrap()
    );
}
