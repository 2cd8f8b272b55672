//! Per-row execution of a compiled consumer chain.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::component::{ComponentInput, FilterOutcomes};
use crate::error::{ExecutionError, ProcessingError};
use crate::job::{ComponentInstance, ComponentJob, ConsumerChain};
use crate::runner::AnalysisListener;
use crate::types::InputRow;

/// Drives one row through every consumer of a chain, in chain order.
///
/// The handler borrows the compiled chain and keeps only per-component error
/// counters of its own; it can be shared across worker threads.
pub(crate) struct ConsumeRowHandler<'a> {
    chain: &'a ConsumerChain,
    listener: Option<&'a Arc<dyn AnalysisListener>>,
    error_counts: Vec<AtomicU64>,
}

impl<'a> ConsumeRowHandler<'a> {
    pub(crate) fn new(
        chain: &'a ConsumerChain,
        listener: Option<&'a Arc<dyn AnalysisListener>>,
    ) -> Self {
        Self {
            chain,
            listener,
            error_counts: (0..chain.consumers().len())
                .map(|_| AtomicU64::new(0))
                .collect(),
        }
    }

    /// Process one row through the whole chain.
    ///
    /// Component failures on a row are counted and reported via the listener;
    /// only a failure of a component flagged fatal aborts the run.
    pub(crate) fn consume_row(&self, row: &mut InputRow) -> Result<(), ExecutionError> {
        let mut outcomes = FilterOutcomes::with_pre_satisfied(self.chain.pre_satisfied());

        for (index, consumer) in self.chain.consumers().iter().enumerate() {
            if !satisfied(consumer, row, &outcomes) {
                continue;
            }

            let step = match consumer.instance() {
                ComponentInstance::Filter(filter) => {
                    let input = ComponentInput::new(row, consumer.input_slots());
                    match filter.categorize(&input) {
                        Ok(outcome) => {
                            outcomes.record(consumer.handle(), outcome);
                            Ok(())
                        }
                        Err(error) => Err(error),
                    }
                }
                ComponentInstance::Transformer(transformer) => {
                    let output = {
                        let input = ComponentInput::new(row, consumer.input_slots());
                        transformer.transform(&input)
                    };
                    match output {
                        Ok(output) => {
                            let slots = consumer.output_slots();
                            if output.len() != slots.len() {
                                Err(ProcessingError::new(format!(
                                    "transformer produced {} values, declared {}",
                                    output.len(),
                                    slots.len()
                                )))
                            } else {
                                row.write_virtual(slots.start, output);
                                Ok(())
                            }
                        }
                        Err(error) => Err(error),
                    }
                }
                ComponentInstance::Analyzer(analyzer) => {
                    let input = ComponentInput::new(row, consumer.input_slots());
                    analyzer.process_row(&input)
                }
            };

            if let Err(error) = step {
                self.error_counts[index].fetch_add(1, Ordering::Relaxed);
                if let Some(listener) = self.listener {
                    listener.on_component_error(consumer.label(), &error);
                }
                if consumer.fatal_on_error() {
                    return Err(ExecutionError::JobAborted {
                        component: consumer.label().to_string(),
                        source: error,
                    });
                }
            }
        }
        Ok(())
    }

    /// Per-component error counts accumulated so far, keyed by label.
    /// Components without errors are omitted.
    pub(crate) fn error_counts(&self) -> BTreeMap<String, u64> {
        let mut counts = BTreeMap::new();
        for (index, consumer) in self.chain.consumers().iter().enumerate() {
            let count = self.error_counts[index].load(Ordering::Relaxed);
            if count > 0 {
                counts.insert(consumer.label().to_string(), count);
            }
        }
        counts
    }
}

/// Whether a consumer should process this row.
///
/// A requirement, when present, fully decides. Without one, a consumer whose
/// inputs include virtual columns runs only if at least one of its producers
/// actually ran for this row; unproduced slots still read as null. Consumers
/// bound purely to physical columns see every row.
fn satisfied(consumer: &ComponentJob, row: &InputRow, outcomes: &FilterOutcomes) -> bool {
    if let Some(requirement) = consumer.requirement() {
        return requirement.is_satisfied(outcomes);
    }
    let virtual_slots: Vec<usize> = consumer
        .input_slots()
        .iter()
        .copied()
        .filter(|&slot| slot >= row.physical_values().len())
        .collect();
    if virtual_slots.is_empty() {
        return true;
    }
    virtual_slots.iter().any(|&slot| row.is_produced(slot))
}
