//! Sequential batch driver.

use super::persister::BatchPersister;
use super::transform::TransformerStats;
use crate::source::BatchSource;
use crate::{Error, Result};
use metrics::counter;

/// Feeds batches from a source through the persister, one at a time.
///
/// A batch is fully committed and acknowledged before the next one is
/// requested from the source. The first failed batch halts the pipeline:
/// `run` returns the error and refuses to run again.
pub struct Pipeline {
    persister: BatchPersister,
    batches: u64,
    events: u64,
    halted: bool,
}

impl Pipeline {
    pub fn new(persister: BatchPersister) -> Self {
        Self {
            persister,
            batches: 0,
            events: 0,
            halted: false,
        }
    }

    /// Process batches until the source ends or a batch fails.
    pub fn run<S: BatchSource + ?Sized>(&mut self, source: &mut S) -> Result<PipelineStats> {
        if self.halted {
            return Err(Error::Halted);
        }

        tracing::info!("Pipeline consuming batches from {} source", source.name());

        loop {
            let batch = match source.next_batch() {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                Err(e) => {
                    self.halted = true;
                    tracing::error!("Source {} failed: {}", source.name(), e);
                    return Err(e);
                }
            };

            let sequence = self.batches + 1;
            let events = batch.events.len();
            tracing::debug!("Persisting batch {} ({} events)", sequence, events);

            match self.persister.persist(batch) {
                Ok(rows) => {
                    self.batches = sequence;
                    self.events += rows as u64;
                    counter!("ingest_batches_total").increment(1);
                    counter!("ingest_events_total").increment(rows as u64);
                    tracing::debug!("Committed batch {} ({} rows)", sequence, rows);
                }
                Err(e) => {
                    self.halted = true;
                    counter!("ingest_batches_failed_total", "kind" => e.kind().as_str())
                        .increment(1);
                    tracing::error!(
                        "Batch {} ({} events) rolled back, {} error: {}",
                        sequence,
                        events,
                        e.kind().as_str(),
                        e
                    );
                    return Err(Error::Batch {
                        sequence,
                        events,
                        source: Box::new(e),
                    });
                }
            }
        }

        tracing::info!(
            "Source {} finished: {} batches, {} events committed",
            source.name(),
            self.batches,
            self.events
        );
        Ok(self.stats())
    }

    /// Get statistics about the run so far.
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            batches_committed: self.batches,
            events_committed: self.events,
            dictionaries: self.persister.stats(),
        }
    }

    /// The persister, e.g. to inspect the store after a run.
    pub fn persister(&self) -> &BatchPersister {
        &self.persister
    }
}

/// Statistics about a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Batches committed and acknowledged.
    pub batches_committed: u64,

    /// Rows written by those batches.
    pub events_committed: u64,

    /// File and host dictionary statistics.
    pub dictionaries: TransformerStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::pipeline::PersisterConfig;
    use crate::source::{Acknowledger, Batch};
    use crate::store::LogStore;
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    fn pipeline() -> Pipeline {
        Pipeline::new(BatchPersister::new(
            LogStore::open_in_memory().unwrap(),
            PersisterConfig::default(),
        ))
    }

    fn event(n: u32) -> Value {
        json!({"message": format!("event {n}"), "source": "/a", "beat": {"name": "h"}})
    }

    /// Scripted source that records when batches are handed out and acked.
    struct Script {
        batches: Vec<Vec<Value>>,
        log: Arc<Mutex<Vec<String>>>,
        fail_after: Option<usize>,
        served: usize,
    }

    impl BatchSource for Script {
        fn name(&self) -> &'static str {
            "script"
        }

        fn next_batch(&mut self) -> Result<Option<Batch>> {
            if self.fail_after == Some(self.served) {
                return Err(Error::Protocol("connection reset".to_string()));
            }
            if self.batches.is_empty() {
                return Ok(None);
            }
            self.served += 1;
            let n = self.served;
            self.log.lock().unwrap().push(format!("next {n}"));

            let events = self
                .batches
                .remove(0)
                .into_iter()
                .map(|v| match v {
                    Value::Object(map) => map,
                    _ => unreachable!(),
                })
                .collect();
            let log = Arc::clone(&self.log);
            let ack = Acknowledger::new(move || log.lock().unwrap().push(format!("ack {n}")));
            Ok(Some(Batch::new(events, ack)))
        }
    }

    fn script(batches: Vec<Vec<Value>>) -> (Script, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let script = Script {
            batches,
            log: Arc::clone(&log),
            fail_after: None,
            served: 0,
        };
        (script, log)
    }

    #[test]
    fn test_each_batch_acked_before_next_is_requested() {
        let (mut source, log) = script(vec![vec![event(1)], vec![event(2), event(3)]]);
        let mut p = pipeline();

        let stats = p.run(&mut source).unwrap();
        assert_eq!(stats.batches_committed, 2);
        assert_eq!(stats.events_committed, 3);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["next 1", "ack 1", "next 2", "ack 2"]
        );
    }

    #[test]
    fn test_failed_batch_halts_pipeline() {
        let (mut source, log) = script(vec![
            vec![event(1)],
            vec![event(2), json!({"source": "/a", "beat": []})],
            vec![event(4)],
        ]);
        let mut p = pipeline();

        let err = p.run(&mut source).unwrap_err();
        assert!(matches!(err, Error::Batch { sequence: 2, events: 2, .. }));
        assert_eq!(err.kind(), ErrorKind::Shape);

        // Batch 3 was never requested, batch 2 never acked
        assert_eq!(*log.lock().unwrap(), vec!["next 1", "ack 1", "next 2"]);
        assert_eq!(p.persister().store().log_count().unwrap(), 1);
        assert_eq!(p.stats().batches_committed, 1);

        let rerun = p.run(&mut source).unwrap_err();
        assert!(matches!(rerun, Error::Halted));
        assert_eq!(rerun.kind(), ErrorKind::Persistence);
    }

    #[test]
    fn test_source_error_is_returned() {
        let (mut source, _) = script(vec![vec![event(1)], vec![event(2)]]);
        source.fail_after = Some(1);
        let mut p = pipeline();

        let err = p.run(&mut source).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(p.stats().batches_committed, 1);
    }

    #[test]
    fn test_dictionary_stats_reported() {
        let (mut source, _) = script(vec![vec![event(1), event(2)], vec![event(3)]]);
        let mut p = pipeline();

        let stats = p.run(&mut source).unwrap();
        assert_eq!(stats.dictionaries.files.inserts, 1);
        assert_eq!(stats.dictionaries.hosts.inserts, 1);
        assert_eq!(stats.dictionaries.files.cache_hits, 2);
    }
}
