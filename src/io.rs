use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::matrix::SymmetricMatrix;
use crate::newick::write_splits;
use crate::split_system::SplitSystem;

fn is_gz(path: &Path) -> bool {
    path.to_string_lossy().ends_with(".gz")
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

/// Opens `path` for reading; `-` is stdin and `.gz` files are decompressed.
fn open_input(path: &Path) -> io::Result<Box<dyn BufRead>> {
    if is_stdio(path) {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let f = File::open(path)?;
    let reader: Box<dyn Read> = if is_gz(path) {
        Box::new(GzDecoder::new(f))
    } else {
        Box::new(f)
    };
    Ok(Box::new(BufReader::new(reader)))
}

/// Opens `path` for writing; `-` is stdout and `.gz` files are compressed.
fn open_output(path: &Path) -> io::Result<Box<dyn Write>> {
    if is_stdio(path) {
        return Ok(Box::new(BufWriter::new(io::stdout())));
    }
    let f = File::create(path)?;
    Ok(if is_gz(path) {
        Box::new(BufWriter::new(GzEncoder::new(f, Compression::default())))
    } else {
        Box::new(BufWriter::new(f))
    })
}

/// Read a labeled square distance matrix from TSV.
///
/// The first line holds the column labels (after a leading empty cell), every
/// further line a row label followed by its distances. Blank lines and lines
/// starting with `#` are skipped. If `path` ends with `.gz` the input is
/// decompressed; `-` reads stdin.
///
/// Returns the labels and the raw rows. Symmetry and range checks are left to
/// [`SymmetricMatrix::from_rows`].
pub fn read_matrix_tsv<P: AsRef<Path>>(path: P) -> io::Result<(Vec<String>, Vec<Vec<f64>>)> {
    let reader = open_input(path.as_ref())?;
    let mut lines = reader
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            line.as_ref()
                .map_or(true, |l| !l.trim().is_empty() && !l.starts_with('#'))
        });

    let header = match lines.next() {
        Some((_, line)) => line?,
        None => return Err(invalid_data("empty distance matrix file".to_string())),
    };
    let names: Vec<String> = header
        .split('\t')
        .skip(1)
        .map(|s| s.trim().to_string())
        .collect();

    let mut rows = Vec::with_capacity(names.len());
    for (idx, line) in lines {
        let line = line?;
        let mut cells = line.split('\t');
        let label = cells.next().unwrap_or_default().trim();
        if names.get(rows.len()).is_some_and(|expected| expected != label) {
            return Err(invalid_data(format!(
                "line {}: row label '{label}' does not match column '{}'",
                idx + 1,
                names[rows.len()]
            )));
        }
        let row = cells
            .map(|cell| {
                cell.trim().parse::<f64>().map_err(|_| {
                    invalid_data(format!("line {}: invalid distance '{}'", idx + 1, cell.trim()))
                })
            })
            .collect::<io::Result<Vec<f64>>>()?;
        rows.push(row);
    }

    if rows.len() != names.len() {
        return Err(invalid_data(format!(
            "{} column labels but {} rows",
            names.len(),
            rows.len()
        )));
    }
    Ok((names, rows))
}

/// Write a labeled square matrix as TSV to a file or stdout.
/// If `path` ends with `.gz`, the output is gzip-compressed.
/// If `path` equals `-`, the matrix is written to stdout (uncompressed).
pub fn write_matrix_tsv<P: AsRef<Path>>(
    path: P,
    names: &[String],
    matrix: &SymmetricMatrix,
) -> io::Result<()> {
    if names.len() != matrix.ntax() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} labels for a matrix of {} taxa", names.len(), matrix.ntax()),
        ));
    }
    let mut out = open_output(path.as_ref())?;

    // Header row
    write!(&mut out, "\t")?;
    for (k, name) in names.iter().enumerate() {
        if k > 0 {
            write!(&mut out, "\t")?;
        }
        write!(&mut out, "{name}")?;
    }
    writeln!(&mut out)?;

    // Rows
    for (name, row) in names.iter().zip(matrix.to_rows()) {
        write!(&mut out, "{name}")?;
        for val in row {
            write!(&mut out, "\t{val}")?;
        }
        writeln!(&mut out)?;
    }

    out.flush()
}

/// Write a split system in the text format of [`crate::newick`], one line,
/// to a file (gzip-compressed for `.gz`) or to stdout for `-`.
pub fn write_splits_file<P: AsRef<Path>>(
    path: P,
    system: &SplitSystem,
    labels: Option<&[String]>,
) -> io::Result<()> {
    let mut out = open_output(path.as_ref())?;
    writeln!(&mut out, "{}", write_splits(system, labels))?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("split-systems-{}-{name}", std::process::id()))
    }

    fn labels() -> Vec<String> {
        ["a", "b", "c"].iter().map(|s| s.to_string()).collect()
    }

    fn matrix() -> SymmetricMatrix {
        SymmetricMatrix::from_rows(&[
            vec![0.0, 1.0, 2.5],
            vec![1.0, 0.0, 3.0],
            vec![2.5, 3.0, 0.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_matrix_tsv_round_trip() {
        for name in ["plain.tsv", "packed.tsv.gz"] {
            let path = temp_path(name);
            write_matrix_tsv(&path, &labels(), &matrix()).unwrap();
            let (names, rows) = read_matrix_tsv(&path).unwrap();
            std::fs::remove_file(&path).unwrap();

            assert_eq!(names, labels());
            assert_eq!(rows, matrix().to_rows());
        }
    }

    #[test]
    fn test_read_rejects_bad_cells_and_labels() {
        let path = temp_path("bad.tsv");
        std::fs::write(&path, "\ta\tb\na\t0\tx\nb\t1\t0\n").unwrap();
        let err = read_matrix_tsv(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        std::fs::write(&path, "# comment\n\ta\tb\n\na\t0\t1\nc\t1\t0\n").unwrap();
        let err = read_matrix_tsv(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_write_splits_file() {
        let path = temp_path("splits.txt");
        write_splits_file(&path, &SplitSystem::new(0), None).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(text, "();\n");
    }
}
