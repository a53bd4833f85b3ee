//! Renders `evolve.in`, the simulator's four-line input file.

use crate::engine::workspace::RunWorkspace;
use crate::error::{PipelineError, PipelineResult};
use crate::model::SimulationParameters;
use std::fmt::Write as _;

/// Whitespace-separated field counts of the four input lines.
pub const LINE_FIELD_COUNTS: [usize; 4] = [3, 4, 6, 3];

/// Render the input text. Pure formatting; validation happened upstream.
///
/// Floats use `Debug` formatting, which is the shortest representation that
/// parses back to the same value and always keeps a decimal point.
pub fn render_input(p: &SimulationParameters) -> String {
    let mut out = String::with_capacity(128);
    let _ = writeln!(out, "{:?} {:?} {:?}", p.mass, p.z, p.tphysf);
    let _ = writeln!(out, "{:?} {:?} {:?} {:?}", p.neta, p.bwind, p.hewind, p.sigma);
    let _ = writeln!(
        out,
        "{} {} {} {} {:?} {}",
        p.ifflag, p.wdflag, p.bhflag, p.nsflag, p.mxns, p.idum
    );
    let _ = writeln!(out, "{:?} {:?} {:?}", p.pts1, p.pts2, p.pts3);
    out
}

/// Write the input file for this run, overwriting any previous one.
pub async fn write_input(ws: &RunWorkspace, p: &SimulationParameters) -> PipelineResult<()> {
    let text = render_input(p);
    tokio::fs::write(&ws.input_path, text)
        .await
        .map_err(|source| PipelineError::WriteInput {
            path: ws.input_path.clone(),
            source,
        })?;
    tracing::debug!(path = %ws.input_path.display(), "wrote simulator input");
    Ok(())
}

/// Read an input file back into parameters. Used to check what a run was fed.
pub fn parse_input(text: &str) -> Option<SimulationParameters> {
    let lines: Vec<Vec<&str>> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.split_whitespace().collect())
        .collect();
    if lines.len() != LINE_FIELD_COUNTS.len()
        || lines
            .iter()
            .zip(LINE_FIELD_COUNTS)
            .any(|(fields, n)| fields.len() != n)
    {
        return None;
    }
    let f = |line: usize, idx: usize| lines[line][idx].parse::<f64>().ok();
    let i = |line: usize, idx: usize| lines[line][idx].parse::<i64>().ok();
    Some(SimulationParameters {
        mass: f(0, 0)?,
        z: f(0, 1)?,
        tphysf: f(0, 2)?,
        neta: f(1, 0)?,
        bwind: f(1, 1)?,
        hewind: f(1, 2)?,
        sigma: f(1, 3)?,
        ifflag: i(2, 0)?,
        wdflag: i(2, 1)?,
        bhflag: i(2, 2)?,
        nsflag: i(2, 3)?,
        mxns: f(2, 4)?,
        idum: i(2, 5)?,
        pts1: f(3, 0)?,
        pts2: f(3, 1)?,
        pts3: f(3, 2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parameters_render_like_the_reference_input() {
        let p = SimulationParameters::new(5.0, 0.02, 12000.0);
        assert_eq!(
            render_input(&p),
            "5.0 0.02 12000.0\n0.5 0.0 0.5 190.0\n0 1 0 1 3.0 999\n0.05 0.01 0.02\n"
        );
    }

    #[test]
    fn field_counts_are_fixed() {
        let mut p = SimulationParameters::new(1.25, 0.0001, 15000.5);
        p.idum = -42;
        p.sigma = 265.0;
        let text = render_input(&p);
        let counts: Vec<usize> = text.lines().map(|l| l.split_whitespace().count()).collect();
        assert_eq!(counts, LINE_FIELD_COUNTS);
    }

    #[test]
    fn rendered_values_read_back_unchanged() {
        let mut p = SimulationParameters::new(0.1 + 0.2, 0.0142, 1.0e4);
        p.neta = 1.0 / 3.0;
        p.mxns = 1.8;
        p.nsflag = 0;
        p.pts3 = 1e-7;
        let parsed = parse_input(&render_input(&p)).expect("parse rendered input");
        assert_eq!(parsed, p);
    }

    #[test]
    fn parse_rejects_wrong_shape() {
        assert!(parse_input("5.0 0.02\n").is_none());
        assert!(parse_input("5.0 0.02 12000.0\n0.5 0.0 0.5 190.0\n0 1 0 1 3.0\n0.05 0.01 0.02\n").is_none());
    }

    #[tokio::test]
    async fn write_input_overwrites_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let ws = RunWorkspace::new("t1", dir.path());
        tokio::fs::write(&ws.input_path, "stale\nstale\nstale\nstale\nstale\n")
            .await
            .unwrap();

        write_input(&ws, &SimulationParameters::new(2.0, 0.02, 100.0))
            .await
            .unwrap();

        let text = std::fs::read_to_string(&ws.input_path).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert!(text.starts_with("2.0 0.02 100.0\n"));
    }

    #[tokio::test]
    async fn write_input_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let ws = RunWorkspace::new("t2", dir.path().join("missing").join("deeper"));
        let err = write_input(&ws, &SimulationParameters::new(2.0, 0.02, 100.0))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::WriteInput { .. }));
    }
}
