use crate::error::Result;
use crate::fission::GenerationResultTable;
use crate::secretary::SuccessCurve;
use anyhow::Context;
use rmp_serde::encode;
use serde::Serialize;
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

/// Human-readable text rendering of a simulation result.
pub trait Report {
    fn write_text(&self, out: &mut dyn Write) -> io::Result<()>;
}

impl Report for GenerationResultTable {
    fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
        for row in self.rows() {
            writeln!(out, "Generation-{}:", row.generation)?;
            for (j, prob) in row.probs.iter().enumerate() {
                writeln!(out, "p[{j}] = {prob:.4}")?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

impl Report for SuccessCurve {
    fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "n = {}, s = {}", self.n_candidates, self.n_successful)?;
        for (m, rate) in self.rates.iter().enumerate() {
            writeln!(out, "m = {m}: {:.4} +/- {:.4}", rate.mean, rate.sem)?;
        }
        writeln!(out)?;
        Ok(())
    }
}

/// Write `report` to any sink.
///
/// # Errors
/// Returns [`SimError::OutputSink`](crate::error::SimError::OutputSink) if the
/// sink rejects a write or flush.
pub fn emit<R: Report + ?Sized, W: Write>(report: &R, mut sink: W) -> Result<()> {
    report.write_text(&mut sink)?;
    sink.flush()?;
    Ok(())
}

/// Write `report` to a newly created text file.
pub fn write_report<R: Report + ?Sized, P: AsRef<Path>>(report: &R, file: P) -> Result<()> {
    let file = File::create(file)?;
    emit(report, BufWriter::new(file))
}

/// Save any result as a MessagePack file.
pub fn save_msgpack<T: Serialize, P: AsRef<Path>>(value: &T, file: P) -> anyhow::Result<()> {
    let file = file.as_ref();
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);
    encode::write(&mut writer, value).context("failed to serialize results")?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::error::SimError;
    use crate::fission::BranchingProcessSimulator;

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn certain_extinction_table(n_generations: usize) -> GenerationResultTable {
        let sim = BranchingProcessSimulator::new(2, n_generations, 0.0, 0.5).unwrap();
        let mut engine = Engine::new(1, 1).unwrap();
        sim.simulate(&mut engine, 10).unwrap()
    }

    #[test]
    fn generation_table_uses_legacy_layout() {
        let table = certain_extinction_table(2);
        let mut buf = Vec::new();
        emit(&table, &mut buf).unwrap();

        let expected = "Generation-1:\n\
                        p[0] = 1.0000\n\
                        p[1] = 0.0000\n\
                        p[2] = 0.0000\n\
                        p[3] = 0.0000\n\
                        \n\
                        Generation-2:\n\
                        p[0] = 1.0000\n\
                        p[1] = 0.0000\n\
                        p[2] = 0.0000\n\
                        p[3] = 0.0000\n\
                        \n";
        assert_eq!(String::from_utf8(buf).unwrap(), expected);
    }

    #[test]
    fn sink_failure_keeps_results() {
        let table = certain_extinction_table(3);
        let result = emit(&table, BrokenSink);
        assert!(matches!(result, Err(SimError::OutputSink(_))));
        assert_eq!(table.rows().len(), 3);
    }

    #[test]
    fn msgpack_results_decode_back() {
        let table = certain_extinction_table(2);
        let file = std::env::temp_dir().join(format!("montecarlo-{}.msgpack", std::process::id()));
        save_msgpack(&table, &file).unwrap();

        let bytes = std::fs::read(&file).unwrap();
        let decoded: GenerationResultTable = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded, table);
        std::fs::remove_file(&file).ok();
    }
}
