//! The observation loop: runs every planned window in order and keeps the schedule
//! pinned to the instant the run started.

use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

use crate::{
    clock::{Clock, WaitOutcome},
    collaborators::{Collaborators, RunRecord},
    config::RunConfig,
    error::{Error, Result, Stage},
    planner::WindowPlan,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub run_start: DateTime<Utc>,
    pub windows_completed: usize,
    /// Windows whose processing ran past the next window's start
    pub overruns: usize,
    /// The run ended early on a stop request
    pub stopped: bool,
}

pub struct ObservationLoop<'a> {
    config: &'a RunConfig,
    plan: &'a WindowPlan,
}

fn instant_at(run_start: DateTime<Utc>, offset: Duration) -> DateTime<Utc> {
    run_start
        + chrono::Duration::seconds(offset.as_secs() as i64)
        + chrono::Duration::nanoseconds(offset.subsec_nanos() as i64)
}

impl<'a> ObservationLoop<'a> {
    pub fn new(config: &'a RunConfig, plan: &'a WindowPlan) -> Self {
        Self { config, plan }
    }

    /// Run every window of the plan.
    ///
    /// Window `i` is targeted at `run_start + offset[i]` no matter how late earlier
    /// windows finished. A window that overruns its slot is followed immediately by
    /// the next one. Anything on `stop` ends the run before the next window starts.
    pub fn run<C: Clock>(
        &self,
        clock: &C,
        collaborators: Collaborators<'_>,
        stop: &Receiver<()>,
    ) -> Result<RunSummary> {
        let Collaborators {
            acquirer,
            resolver,
            analyzer,
            plotter,
            persister,
        } = collaborators;
        let config = self.config;
        let dsp = config.dsp();
        let num_windows = self.plan.len();

        let run_start = clock.now();
        let mut summary = RunSummary {
            run_start,
            windows_completed: 0,
            overruns: 0,
            stopped: false,
        };
        info!(
            windows = num_windows,
            interval_s = self.plan.interval().as_secs(),
            %run_start,
            "Starting observation run"
        );

        for (i, offset) in self.plan.offsets().iter().enumerate() {
            if stop.try_recv().is_ok() {
                info!("Stop requested, ending run");
                summary.stopped = true;
                break;
            }
            let target = instant_at(run_start, *offset);
            let coordinates = resolver
                .resolve(target, config.observer())
                .map_err(Error::at(Stage::Coordinates))?;
            info!(
                window = i + 1,
                of = num_windows,
                %target,
                ra = coordinates.right_ascension,
                dec = coordinates.declination,
                "Started observing"
            );
            info!(
                "Receiving {} blocks of {} samples",
                dsp.number_of_fft,
                dsp.samples_per_block()
            );
            let samples = acquirer
                .collect(config.device().sample_rate, dsp)
                .map_err(Error::at(Stage::Acquisition))?;
            debug!("Analyzing data");
            let analysis = analyzer
                .analyze(samples, &coordinates)
                .map_err(Error::at(Stage::Analysis))?;
            debug!("Plotting data");
            plotter
                .plot(config.plotting(), &analysis)
                .map_err(Error::at(Stage::Plotting))?;
            if config.datafile() {
                let record = RunRecord {
                    run_start,
                    device: config.device(),
                    dsp,
                    observer: config.observer(),
                    observation: config.observation(),
                };
                persister
                    .persist(&record)
                    .map_err(Error::at(Stage::Datafile))?;
            }
            summary.windows_completed += 1;
            info!(window = i + 1, finished = %clock.now(), "Done observing");

            // No wait after the final window, and never for a single shot
            let next_offset = match self.plan.offset(i + 1) {
                Some(next) => next,
                None => break,
            };
            let next = instant_at(run_start, next_offset);
            match (next - clock.now()).to_std() {
                Ok(delay) if !delay.is_zero() => {
                    info!("Waiting for next data collection in {:?}", delay);
                    if clock.wait(delay, stop) == WaitOutcome::Stopped {
                        info!("Stop requested while waiting, ending run");
                        summary.stopped = true;
                        break;
                    }
                }
                _ => {
                    summary.overruns += 1;
                    warn!(
                        window = i + 1,
                        scheduled = %next,
                        "Window overran its slot, starting the next one immediately"
                    );
                }
            }
        }

        info!(
            completed = summary.windows_completed,
            overruns = summary.overruns,
            stopped = summary.stopped,
            "Observation run finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        rc::Rc,
    };

    use chrono::TimeZone;
    use crossbeam_channel::{bounded, never, Sender};

    use super::*;
    use crate::{
        clock::ManualClock,
        collaborators::*,
        complex::ComplexByte,
        config::{tests::sample, DspParams, ObservationMode, ObserverParams, PlottingParams},
        error::BoxError,
        planner::plan,
    };

    #[derive(Clone, Debug, PartialEq)]
    enum Event {
        Resolve(DateTime<Utc>),
        Collect,
        Analyze(DateTime<Utc>),
        Plot,
        Persist(DateTime<Utc>),
    }

    type Log = Rc<RefCell<Vec<Event>>>;
    type FakeResult<T> = std::result::Result<T, BoxError>;

    /// Makes a fake fail on its `call`th invocation (1-based)
    #[derive(Default)]
    struct FailOn {
        call: Option<usize>,
        calls: Cell<usize>,
    }

    impl FailOn {
        fn check(&self, what: &str) -> FakeResult<()> {
            let n = self.calls.get() + 1;
            self.calls.set(n);
            if self.call == Some(n) {
                return Err(format!("{what} failed on call {n}").into());
            }
            Ok(())
        }
    }

    struct FakeSdr {
        log: Log,
        clock: Rc<ManualClock>,
        /// How long each successive acquisition takes
        durations: Vec<Duration>,
        fail: FailOn,
    }

    impl Acquirer for FakeSdr {
        fn collect(&mut self, sample_rate: f64, _dsp: &DspParams) -> FakeResult<Samples> {
            self.fail.check("acquisition")?;
            self.log.borrow_mut().push(Event::Collect);
            if !self.durations.is_empty() {
                self.clock.advance(self.durations.remove(0));
            }
            Ok(Samples {
                sample_rate,
                center_frequency: 1420.4e6,
                blocks: vec![vec![ComplexByte::new(1, 1)]],
            })
        }
    }

    struct FakeResolver {
        log: Log,
        fail: FailOn,
    }

    impl CoordinateResolver for FakeResolver {
        fn resolve(
            &self,
            instant: DateTime<Utc>,
            observer: &ObserverParams,
        ) -> FakeResult<Coordinates> {
            self.fail.check("resolver")?;
            self.log.borrow_mut().push(Event::Resolve(instant));
            Ok(Coordinates {
                instant,
                right_ascension: 0.0,
                declination: observer.latitude,
                local_sidereal_time: 0.0,
            })
        }
    }

    struct FakeAnalyzer {
        log: Log,
        fail: FailOn,
    }

    impl Analyzer for FakeAnalyzer {
        fn analyze(
            &mut self,
            samples: Samples,
            coordinates: &Coordinates,
        ) -> FakeResult<Analysis> {
            self.fail.check("analyzer")?;
            self.log
                .borrow_mut()
                .push(Event::Analyze(coordinates.instant));
            Ok(Analysis {
                coordinates: *coordinates,
                frequencies: vec![samples.center_frequency],
                spectrum: vec![1.0],
                total_power: 1.0,
            })
        }
    }

    struct FakePlotter {
        log: Log,
        stop_after: Option<Sender<()>>,
        fail: FailOn,
    }

    impl Plotter for FakePlotter {
        fn plot(&mut self, _plotting: &PlottingParams, _analysis: &Analysis) -> FakeResult<()> {
            self.fail.check("plotter")?;
            self.log.borrow_mut().push(Event::Plot);
            if let Some(tx) = self.stop_after.take() {
                tx.send(()).unwrap();
            }
            Ok(())
        }
    }

    struct FakePersister {
        log: Log,
        fail: FailOn,
    }

    impl Persister for FakePersister {
        fn persist(&mut self, record: &RunRecord<'_>) -> FakeResult<()> {
            self.fail.check("persister")?;
            self.log.borrow_mut().push(Event::Persist(record.run_start));
            Ok(())
        }
    }

    struct Harness {
        log: Log,
        clock: Rc<ManualClock>,
        sdr: FakeSdr,
        resolver: FakeResolver,
        analyzer: FakeAnalyzer,
        plotter: FakePlotter,
        persister: FakePersister,
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, 0, 0, 0).unwrap()
    }

    impl Harness {
        fn new(durations: Vec<Duration>) -> Self {
            let log: Log = Rc::default();
            let clock = Rc::new(ManualClock::new(start()));
            Self {
                sdr: FakeSdr {
                    log: log.clone(),
                    clock: clock.clone(),
                    durations,
                    fail: FailOn::default(),
                },
                resolver: FakeResolver {
                    log: log.clone(),
                    fail: FailOn::default(),
                },
                analyzer: FakeAnalyzer {
                    log: log.clone(),
                    fail: FailOn::default(),
                },
                plotter: FakePlotter {
                    log: log.clone(),
                    stop_after: None,
                    fail: FailOn::default(),
                },
                persister: FakePersister {
                    log: log.clone(),
                    fail: FailOn::default(),
                },
                log,
                clock,
            }
        }

        fn run(&mut self, config: &RunConfig, stop: &Receiver<()>) -> Result<RunSummary> {
            let plan = plan(config)?;
            let collaborators = Collaborators {
                acquirer: &mut self.sdr,
                resolver: &self.resolver,
                analyzer: &mut self.analyzer,
                plotter: &mut self.plotter,
                persister: &mut self.persister,
            };
            ObservationLoop::new(config, &plan).run(&*self.clock, collaborators, stop)
        }

        fn events(&self) -> Vec<Event> {
            self.log.borrow().clone()
        }

        fn resolved(&self) -> Vec<DateTime<Utc>> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    Event::Resolve(t) => Some(t),
                    _ => None,
                })
                .collect()
        }
    }

    fn hours(h: u64) -> Duration {
        Duration::from_secs(h * 3600)
    }

    fn at_hour(h: i64) -> DateTime<Utc> {
        start() + chrono::Duration::hours(h)
    }

    fn survey(degree_interval: u32) -> RunConfig {
        sample().with_mode(ObservationMode::Survey24h { degree_interval })
    }

    #[test]
    fn test_window_sequence() {
        let mut harness = Harness::new(vec![]);
        let summary = harness.run(&survey(90), &never()).unwrap();
        assert_eq!(summary.windows_completed, 4);
        assert_eq!(summary.overruns, 0);
        assert!(!summary.stopped);
        let events = harness.events();
        assert_eq!(events.len(), 4 * 5);
        for (i, window) in events.chunks(5).enumerate() {
            let target = at_hour(6 * i as i64);
            assert_eq!(
                window,
                &[
                    Event::Resolve(target),
                    Event::Collect,
                    Event::Analyze(target),
                    Event::Plot,
                    Event::Persist(start()),
                ]
            );
        }
        // Three waits between four windows, none after the last
        assert_eq!(harness.clock.waits(), vec![hours(6); 3]);
    }

    #[test]
    fn test_wait_accounts_for_processing() {
        let mut harness = Harness::new(vec![hours(1), hours(2), hours(3), hours(4)]);
        harness.run(&survey(90), &never()).unwrap();
        assert_eq!(harness.clock.waits(), vec![hours(5), hours(4), hours(3)]);
        // Run ends when the last window does
        assert_eq!(harness.clock.now(), at_hour(18 + 4));
    }

    #[test]
    fn test_overrun_does_not_accumulate() {
        // First window takes 8h of a 6h slot
        let mut harness = Harness::new(vec![hours(8), hours(1), hours(1), hours(1)]);
        let summary = harness.run(&survey(90), &never()).unwrap();
        assert_eq!(summary.overruns, 1);
        assert_eq!(summary.windows_completed, 4);
        assert_eq!(
            harness.resolved(),
            vec![at_hour(0), at_hour(6), at_hour(12), at_hour(18)]
        );
        // Window 2 starts at 8h and ends at 9h, so it waits 3h to hit 12h
        assert_eq!(harness.clock.waits(), vec![hours(3), hours(5)]);
    }

    #[test]
    fn test_exact_deadline_is_an_overrun() {
        let mut harness = Harness::new(vec![hours(6), hours(6), hours(6), hours(6)]);
        let summary = harness.run(&survey(90), &never()).unwrap();
        assert_eq!(summary.overruns, 3);
        assert!(harness.clock.waits().is_empty());
    }

    #[test]
    fn test_single_shot_never_waits() {
        let config = sample().with_mode(ObservationMode::SingleShot);
        let mut harness = Harness::new(vec![hours(48)]);
        let summary = harness.run(&config, &never()).unwrap();
        assert_eq!(summary.windows_completed, 1);
        assert_eq!(summary.overruns, 0);
        assert!(harness.clock.waits().is_empty());
        assert_eq!(harness.resolved(), vec![start()]);
    }

    #[test]
    fn test_once_a_day_never_waits() {
        let mut harness = Harness::new(vec![]);
        let summary = harness.run(&survey(360), &never()).unwrap();
        assert_eq!(summary.windows_completed, 1);
        assert!(harness.clock.waits().is_empty());
    }

    #[test]
    fn test_no_datafile() {
        let config = RunConfig::from_json_str(
            &crate::config::tests::SAMPLE.replace("\"datafile\": true", "\"datafile\": false"),
        )
        .unwrap();
        let mut harness = Harness::new(vec![]);
        harness.run(&config, &never()).unwrap();
        assert!(!harness
            .events()
            .iter()
            .any(|e| matches!(e, Event::Persist(_))));
    }

    #[test]
    fn test_invalid_interval_touches_nothing() {
        let mut harness = Harness::new(vec![]);
        let err = harness.run(&survey(7), &never()).unwrap_err();
        assert!(matches!(err, Error::InvalidInterval { degree_interval: 7 }));
        assert!(harness.events().is_empty());
    }

    /// One full window at `hour`, as logged by the fakes
    fn window_events(hour: i64) -> Vec<Event> {
        vec![
            Event::Resolve(at_hour(hour)),
            Event::Collect,
            Event::Analyze(at_hour(hour)),
            Event::Plot,
            Event::Persist(start()),
        ]
    }

    fn assert_failed_at(err: Error, expected: Stage) {
        match err {
            Error::Collaborator { stage, .. } => assert_eq!(stage, expected),
            other => panic!("expected a {expected} failure, got {other:?}"),
        }
    }

    #[test]
    fn test_resolver_failure_aborts() {
        let mut harness = Harness::new(vec![]);
        harness.resolver.fail.call = Some(2);
        let err = harness.run(&survey(90), &never()).unwrap_err();
        assert_failed_at(err, Stage::Coordinates);
        // Window 2 never got as far as acquisition
        assert_eq!(harness.events(), window_events(0));
        assert_eq!(harness.clock.waits(), vec![hours(6)]);
    }

    #[test]
    fn test_acquisition_failure_aborts() {
        let mut harness = Harness::new(vec![]);
        harness.sdr.fail.call = Some(2);
        let err = harness.run(&survey(90), &never()).unwrap_err();
        assert_failed_at(err, Stage::Acquisition);
        let mut expected = window_events(0);
        expected.push(Event::Resolve(at_hour(6)));
        assert_eq!(harness.events(), expected);
        assert_eq!(harness.clock.waits(), vec![hours(6)]);
    }

    #[test]
    fn test_analysis_failure_aborts() {
        let mut harness = Harness::new(vec![]);
        harness.analyzer.fail.call = Some(2);
        let err = harness.run(&survey(90), &never()).unwrap_err();
        assert_failed_at(err, Stage::Analysis);
        let mut expected = window_events(0);
        expected.extend([Event::Resolve(at_hour(6)), Event::Collect]);
        assert_eq!(harness.events(), expected);
    }

    #[test]
    fn test_plotting_failure_aborts() {
        let mut harness = Harness::new(vec![]);
        harness.plotter.fail.call = Some(2);
        let err = harness.run(&survey(90), &never()).unwrap_err();
        assert_failed_at(err, Stage::Plotting);
        let mut expected = window_events(0);
        expected.extend([
            Event::Resolve(at_hour(6)),
            Event::Collect,
            Event::Analyze(at_hour(6)),
        ]);
        // No datafile for the failed window and no third window
        assert_eq!(harness.events(), expected);
        assert_eq!(harness.clock.waits(), vec![hours(6)]);
    }

    #[test]
    fn test_datafile_failure_aborts() {
        let mut harness = Harness::new(vec![]);
        harness.persister.fail.call = Some(1);
        let err = harness.run(&survey(90), &never()).unwrap_err();
        assert_failed_at(err, Stage::Datafile);
        let mut expected = window_events(0);
        expected.pop();
        assert_eq!(harness.events(), expected);
        // Second window is never resolved and nothing waits for it
        assert_eq!(harness.resolved(), vec![start()]);
        assert!(harness.clock.waits().is_empty());
    }

    #[test]
    fn test_stop_during_wait() {
        let (tx, rx) = bounded(1);
        let mut harness = Harness::new(vec![]);
        harness.plotter.stop_after = Some(tx);
        let summary = harness.run(&survey(90), &rx).unwrap();
        assert!(summary.stopped);
        assert_eq!(summary.windows_completed, 1);
        assert_eq!(harness.resolved(), vec![start()]);
    }

    #[test]
    fn test_stop_before_start() {
        let (tx, rx) = bounded(1);
        tx.send(()).unwrap();
        let mut harness = Harness::new(vec![]);
        let summary = harness.run(&survey(90), &rx).unwrap();
        assert!(summary.stopped);
        assert_eq!(summary.windows_completed, 0);
        assert!(harness.events().is_empty());
    }
}
