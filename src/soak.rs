use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rayon::prelude::*;

use crate::image::MEMORY_SIZE;
use crate::substrate::Substrate;

/// Configuration for a soak run over random memory images.
pub struct SoakConfig {
    /// Number of random images to execute.
    pub images: usize,
    /// Maximum steps per image.
    pub step_limit: usize,
}

impl Default for SoakConfig {
    fn default() -> Self {
        Self {
            images: 4096,
            step_limit: 1000,
        }
    }
}

/// Aggregate outcome of a soak run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SoakReport {
    pub images: usize,
    /// Images that executed HLT, including on their last budgeted step.
    pub halted: usize,
    pub total_steps: u64,
    /// Bytes across all images that are not documented opcodes.
    pub undocumented_bytes: u64,
    /// Cells whose value differs after execution.
    pub rewritten_cells: u64,
}

impl SoakReport {
    pub fn csv_header() -> &'static str {
        "images,halted,total_steps,undocumented_bytes,rewritten_cells"
    }

    pub fn csv_row(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.images, self.halted, self.total_steps, self.undocumented_bytes, self.rewritten_cells
        )
    }

    fn merge(self, other: Self) -> Self {
        Self {
            images: self.images + other.images,
            halted: self.halted + other.halted,
            total_steps: self.total_steps + other.total_steps,
            undocumented_bytes: self.undocumented_bytes + other.undocumented_bytes,
            rewritten_cells: self.rewritten_cells + other.rewritten_cells,
        }
    }
}

/// Generate `config.images` random images from `seed` and run each one on
/// `S` in parallel. The result depends only on the seed and the config.
pub fn run<S: Substrate>(config: &SoakConfig, seed: u64) -> SoakReport {
    let mut rng = SmallRng::seed_from_u64(seed);
    let images: Vec<Vec<u8>> = (0..config.images)
        .map(|_| {
            let mut image = vec![0u8; MEMORY_SIZE];
            rng.fill(&mut image[..]);
            image
        })
        .collect();

    let step_limit = config.step_limit;
    let report = images
        .into_par_iter()
        .map(|original| {
            let mut tape = original.clone();
            let outcome = S::execute(&mut tape, step_limit);
            SoakReport {
                images: 1,
                halted: usize::from(outcome.halted),
                total_steps: outcome.steps as u64,
                undocumented_bytes: original.iter().filter(|&&b| !S::is_instruction(b)).count()
                    as u64,
                rewritten_cells: original.iter().zip(&tape).filter(|(a, b)| a != b).count()
                    as u64,
            }
        })
        .reduce(SoakReport::default, SoakReport::merge);

    log::info!(
        "soak: {} images, {} halted, {} steps",
        report.images,
        report.halted,
        report.total_steps
    );
    report
}
