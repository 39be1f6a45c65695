//! Precondition checks run before any archive is read or written.

use std::fs;

use crate::error::{ArchiverError, IoResultExt, Result};
use crate::options::IoOptions;

/// Ensure that:
/// - the input path exists and is a non-empty directory
/// - the output path is a directory if it exists
///
/// The output directory (and its parents) is created when missing.
pub fn check_arguments<O: IoOptions + ?Sized>(options: &O) -> Result<()> {
    let input = options.input();
    if !input.exists() {
        return Err(ArchiverError::NotFound(format!(
            "Input '{}' does not exist",
            input.display()
        )));
    }
    if !input.is_dir() {
        return Err(ArchiverError::InvalidArgument(format!(
            "Input '{}' is not a directory",
            input.display()
        )));
    }
    let mut children = fs::read_dir(input).with_path(input)?;
    if children.next().transpose().with_path(input)?.is_none() {
        return Err(ArchiverError::NotFound(format!(
            "Input '{}' is empty",
            input.display()
        )));
    }

    let output = options.output();
    if output.exists() {
        if !output.is_dir() {
            return Err(ArchiverError::InvalidArgument(format!(
                "Output '{}' is not a directory",
                output.display()
            )));
        }
    } else {
        fs::create_dir_all(output).with_path(output)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::options::CompressionOptions;

    fn options(input: &std::path::Path, output: &std::path::Path) -> CompressionOptions {
        CompressionOptions::new(input, output, 1024, -1).unwrap()
    }

    #[test]
    fn missing_input_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = check_arguments(&options(&tmp.path().join("nope"), tmp.path())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn file_input_is_invalid() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("file.txt");
        fs::write(&file, b"x").unwrap();

        let err = check_arguments(&options(&file, tmp.path())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn empty_input_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("empty");
        fs::create_dir(&input).unwrap();

        let err = check_arguments(&options(&input, &tmp.path().join("out"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn output_file_is_invalid() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("in");
        fs::create_dir(&input).unwrap();
        fs::write(input.join("a.txt"), b"a").unwrap();
        let output = tmp.path().join("out.txt");
        fs::write(&output, b"not a dir").unwrap();

        let err = check_arguments(&options(&input, &output)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn missing_output_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("in");
        fs::create_dir(&input).unwrap();
        fs::write(input.join("a.txt"), b"a").unwrap();
        let output = tmp.path().join("deep").join("out");

        check_arguments(&options(&input, &output)).unwrap();
        assert!(output.is_dir());
    }
}
