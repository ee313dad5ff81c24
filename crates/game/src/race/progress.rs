/// Why a checkpoint crossing was not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Finished,
    NoCheckpoints,
    OutOfOrder { expected: u32, got: u32 },
}

/// An accepted crossing and what it completed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    pub checkpoint: u32,
    pub sector_time: f32,
    pub lap_completed: bool,
    pub race_completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PassOutcome {
    Accepted(Crossing),
    Rejected(Rejection),
}

impl PassOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn crossing(&self) -> Option<&Crossing> {
        match self {
            Self::Accepted(crossing) => Some(crossing),
            Self::Rejected(_) => None,
        }
    }

    pub fn lap_completed(&self) -> bool {
        self.crossing().is_some_and(|c| c.lap_completed)
    }

    pub fn race_completed(&self) -> bool {
        self.crossing().is_some_and(|c| c.race_completed)
    }
}

/// Lap and sector progress of one racer. Owned by the server; only
/// [`CheckpointProgress::try_pass`] mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointProgress {
    checkpoint_count: u32,
    total_laps: u32,
    current_lap: u32,
    next_checkpoint: u32,
    race_finished: bool,
    sector_times: Vec<f32>,
    lap_times: Vec<f32>,
    lap_start_time: f32,
    last_sector_start_time: f32,
    finish_time: Option<f32>,
}

impl CheckpointProgress {
    pub fn new(
        checkpoint_count: u32,
        total_laps: u32,
        start_time: f32,
        initial_checkpoint: u32,
    ) -> Self {
        let checkpoint_count = checkpoint_count.max(1);
        Self {
            checkpoint_count,
            total_laps: total_laps.max(1),
            current_lap: 0,
            next_checkpoint: initial_checkpoint.min(checkpoint_count - 1),
            race_finished: false,
            sector_times: Vec::new(),
            lap_times: Vec::new(),
            lap_start_time: start_time,
            last_sector_start_time: start_time,
            finish_time: None,
        }
    }

    pub fn try_pass(&mut self, checkpoint: u32, time: f32) -> PassOutcome {
        if self.race_finished {
            return PassOutcome::Rejected(Rejection::Finished);
        }
        if self.checkpoint_count == 0 {
            return PassOutcome::Rejected(Rejection::NoCheckpoints);
        }
        if checkpoint != self.next_checkpoint {
            return PassOutcome::Rejected(Rejection::OutOfOrder {
                expected: self.next_checkpoint,
                got: checkpoint,
            });
        }

        let sector_time = (time - self.last_sector_start_time).max(0.0);
        self.sector_times.push(sector_time);
        self.last_sector_start_time = time;
        self.next_checkpoint = (self.next_checkpoint + 1) % self.checkpoint_count;

        let mut lap_completed = false;
        let mut race_completed = false;
        if self.next_checkpoint == 0 {
            self.current_lap += 1;
            lap_completed = true;
            self.lap_times.push((time - self.lap_start_time).max(0.0));
            self.lap_start_time = time;

            if self.current_lap >= self.total_laps {
                self.race_finished = true;
                self.finish_time = Some(time);
                race_completed = true;
            }
        }

        PassOutcome::Accepted(Crossing {
            checkpoint,
            sector_time,
            lap_completed,
            race_completed,
        })
    }

    pub fn checkpoint_count(&self) -> u32 {
        self.checkpoint_count
    }

    pub fn total_laps(&self) -> u32 {
        self.total_laps
    }

    pub fn current_lap(&self) -> u32 {
        self.current_lap
    }

    pub fn next_checkpoint(&self) -> u32 {
        self.next_checkpoint
    }

    pub fn is_finished(&self) -> bool {
        self.race_finished
    }

    pub fn sector_times(&self) -> &[f32] {
        &self.sector_times
    }

    pub fn lap_times(&self) -> &[f32] {
        &self.lap_times
    }

    pub fn best_lap(&self) -> Option<f32> {
        self.lap_times.iter().copied().reduce(f32::min)
    }

    pub fn lap_start_time(&self) -> f32 {
        self.lap_start_time
    }

    pub fn last_sector_start_time(&self) -> f32 {
        self.last_sector_start_time
    }

    pub fn finish_time(&self) -> Option<f32> {
        self.finish_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn laps_and_finish() {
        let mut progress = CheckpointProgress::new(3, 2, 0.0, 0);

        let rejected = progress.try_pass(1, 0.5);
        assert_eq!(
            rejected,
            PassOutcome::Rejected(Rejection::OutOfOrder { expected: 0, got: 1 })
        );
        assert_eq!(progress.next_checkpoint(), 0);

        assert!(progress.try_pass(0, 1.0).is_accepted());
        assert!(progress.try_pass(1, 2.0).is_accepted());
        let lap = progress.try_pass(2, 3.0);
        assert!(lap.is_accepted());
        assert!(lap.lap_completed());
        assert!(!lap.race_completed());
        assert_eq!(progress.current_lap(), 1);

        assert!(progress.try_pass(0, 4.0).is_accepted());
        assert!(progress.try_pass(1, 5.0).is_accepted());
        let finish = progress.try_pass(2, 6.0);
        assert!(finish.lap_completed());
        assert!(finish.race_completed());
        assert!(progress.is_finished());
        assert_eq!(progress.finish_time(), Some(6.0));

        assert_eq!(
            progress.try_pass(0, 7.0),
            PassOutcome::Rejected(Rejection::Finished)
        );
        assert_eq!(progress.sector_times().len(), 6);
    }

    #[test]
    fn sector_times_from_start() {
        let mut progress = CheckpointProgress::new(3, 1, 10.0, 0);

        progress.try_pass(0, 12.0);
        progress.try_pass(1, 15.5);
        progress.try_pass(2, 20.0);

        let expected = [2.0, 3.5, 4.5];
        assert_eq!(progress.sector_times().len(), expected.len());
        for (actual, expected) in progress.sector_times().iter().zip(expected) {
            assert!((actual - expected).abs() < 0.001);
        }
        assert!((progress.lap_times()[0] - 10.0).abs() < 0.001);
    }

    #[test]
    fn crossing_before_sector_start_records_zero() {
        let mut progress = CheckpointProgress::new(2, 1, 5.0, 0);
        let outcome = progress.try_pass(0, 4.0);

        assert_eq!(outcome.crossing().map(|c| c.sector_time), Some(0.0));
        assert_eq!(progress.last_sector_start_time(), 4.0);
    }

    #[test]
    fn single_checkpoint_completes_lap_each_pass() {
        let mut progress = CheckpointProgress::new(0, 0, 0.0, 3);
        assert_eq!(progress.checkpoint_count(), 1);
        assert_eq!(progress.total_laps(), 1);
        assert_eq!(progress.next_checkpoint(), 0);

        let outcome = progress.try_pass(0, 30.0);
        assert!(outcome.race_completed());
    }

    #[test]
    fn initial_checkpoint_is_clamped() {
        let progress = CheckpointProgress::new(4, 3, 0.0, 9);
        assert_eq!(progress.next_checkpoint(), 3);
    }

    #[test]
    fn best_lap_is_fastest() {
        let mut progress = CheckpointProgress::new(1, 3, 0.0, 0);
        progress.try_pass(0, 30.0);
        progress.try_pass(0, 55.0);
        progress.try_pass(0, 85.0);

        assert_eq!(progress.lap_times(), &[30.0, 25.0, 30.0]);
        assert_eq!(progress.best_lap(), Some(25.0));
    }
}
