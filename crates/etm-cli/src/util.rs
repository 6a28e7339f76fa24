use std::{
    fs::File,
    io::{self, BufWriter, StdoutLock, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context;
use etm_features::{
    schema::{MissingSentinels, RawTable},
    table::FeatureTable,
};

#[derive(Debug)]
pub enum Output {
    Stdout {
        writer: StdoutLock<'static>,
    },
    File {
        writer: BufWriter<File>,
        path: PathBuf,
    },
}

impl Output {
    pub fn save_json<T>(value: &T, output_path: Option<PathBuf>) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        let mut output = Output::from_output_path(output_path)?;
        output.write_json(value)
    }

    pub fn from_output_path(output_path: Option<PathBuf>) -> anyhow::Result<Self> {
        match output_path {
            Some(path) => Output::open(path),
            None => Ok(Output::stdout()),
        }
    }

    pub fn stdout() -> Self {
        Output::Stdout {
            writer: io::stdout().lock(),
        }
    }

    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let file = File::create(&path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Output::File {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn display_path(&self) -> String {
        match self {
            Output::Stdout { .. } => "stdout".to_string(),
            Output::File { path, .. } => path.display().to_string(),
        }
    }

    pub fn write_json<T>(&mut self, value: T) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        serde_json::to_writer_pretty(&mut *self, &value)
            .with_context(|| format!("Failed to write JSON to {}", self.display_path()))?;
        writeln!(&mut *self).with_context(|| {
            format!(
                "Failed to write newline after JSON to {}",
                self.display_path()
            )
        })?;
        self.flush()
            .with_context(|| format!("Failed to flush output to {}", self.display_path()))?;
        Ok(())
    }

    /// Writes serializable rows as CSV, header taken from the first row.
    pub fn write_csv_rows<T>(&mut self, rows: &[T]) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        let display_path = self.display_path();
        let mut writer = csv::Writer::from_writer(&mut *self);
        for row in rows {
            writer
                .serialize(row)
                .with_context(|| format!("Failed to write CSV row to {display_path}"))?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to flush output to {display_path}"))?;
        Ok(())
    }

    /// Writes a feature table as CSV with `random_id` first.
    pub fn write_feature_table(&mut self, table: &FeatureTable) -> anyhow::Result<()> {
        let display_path = self.display_path();
        let mut writer = csv::Writer::from_writer(&mut *self);
        writer
            .write_record(table.header())
            .with_context(|| format!("Failed to write CSV header to {display_path}"))?;
        for row in 0..table.len() {
            writer
                .write_record(table.record(row))
                .with_context(|| format!("Failed to write CSV row to {display_path}"))?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to flush output to {display_path}"))?;
        Ok(())
    }
}

impl io::Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout { writer } => writer.write(buf),
            Output::File { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout { writer } => writer.flush(),
            Output::File { writer, .. } => writer.flush(),
        }
    }
}

fn raw_table_from_reader<R>(reader: R) -> csv::Result<RawTable>
where
    R: io::Read,
{
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers()?.clone();
    let rows = reader
        .records()
        .map(|record| record.map(|r| r.iter().map(str::to_owned).collect()))
        .collect::<csv::Result<Vec<Vec<String>>>>()?;
    Ok(RawTable::new(headers.iter(), rows))
}

/// Reads a CSV export into a [`RawTable`] with standardized headers.
pub fn read_csv_file<P>(file_kind: &str, path: P) -> anyhow::Result<RawTable>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} file: {}", file_kind, path.display()))?;
    let table = raw_table_from_reader(io::BufReader::new(file)).with_context(|| {
        format!("Failed to parse {} CSV file: {}", file_kind, path.display())
    })?;
    tracing::info!(
        kind = file_kind,
        path = %path.display(),
        rows = table.len(),
        columns = table.columns().len(),
        "read CSV"
    );
    Ok(table)
}

/// Reads a feature table previously written by `build-features`; `sentinels`
/// cells read as missing.
pub fn read_feature_table<P>(
    path: P,
    sentinels: &MissingSentinels,
) -> anyhow::Result<FeatureTable>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let raw = read_csv_file("feature table", path)?;
    FeatureTable::from_raw_with(&raw, sentinels)
        .with_context(|| format!("Invalid feature table: {}", path.display()))
}
