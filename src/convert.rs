use std::io;
use std::path::Path;
use std::process::Command;

use anyhow::Context as _;

/// Run the external converter over the finished package. The converter is
/// an optional enhancement: a machine without it still has the OPF
/// package, so a missing binary only logs a warning.
pub fn run_kindlegen(
    kindlegen: &str,
    out_dir: &Path,
    opf_filename: &str,
    mobi_filename: &str,
) -> anyhow::Result<()> {
    tracing::info!(%kindlegen, opf = opf_filename, "converting package");

    let output = match Command::new(kindlegen)
        .current_dir(out_dir)
        .args(["-c2", "-o", mobi_filename, opf_filename])
        .output()
    {
        Ok(output) => output,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::warn!(%kindlegen, "kindlegen not found; skipping .mobi conversion");
            return Ok(());
        }
        Err(err) => return Err(err).with_context(|| format!("run kindlegen: {kindlegen}")),
    };

    // kindlegen exits nonzero for recoverable build warnings too, so the
    // status is reported rather than treated as fatal.
    if output.status.success() {
        tracing::info!(mobi = mobi_filename, "conversion finished");
    } else {
        tracing::warn!(
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr),
            "kindlegen exited with a non-success status"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_not_an_error() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        run_kindlegen(
            "definitely-no-such-kindlegen-binary",
            temp.path(),
            "edition.opf",
            "edition.mobi",
        )
    }
}
