use rkyv::{Archive, Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub enum RacePhase {
    Lobby,
    Countdown,
    Race,
    Results,
}

impl RacePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RacePhase::Lobby => "lobby",
            RacePhase::Countdown => "countdown",
            RacePhase::Race => "race",
            RacePhase::Results => "results",
        }
    }
}

/// Server-owned match flow. The race clock it keeps is the authoritative
/// timestamp source for checkpoint crossings.
#[derive(Debug, Clone)]
pub struct RaceDirector {
    phase: RacePhase,
    countdown_seconds: f32,
    countdown: f32,
    race_time: f32,
}

impl RaceDirector {
    pub fn new(countdown_seconds: f32) -> Self {
        Self {
            phase: RacePhase::Lobby,
            countdown_seconds: countdown_seconds.max(1.0),
            countdown: 0.0,
            race_time: 0.0,
        }
    }

    pub fn phase(&self) -> RacePhase {
        self.phase
    }

    pub fn race_time(&self) -> f32 {
        self.race_time
    }

    pub fn countdown_remaining(&self) -> f32 {
        self.countdown
    }

    pub fn is_racing(&self) -> bool {
        self.phase == RacePhase::Race
    }

    pub fn request_countdown(&mut self) -> bool {
        if self.phase != RacePhase::Lobby {
            return false;
        }
        self.phase = RacePhase::Countdown;
        self.countdown = self.countdown_seconds;
        true
    }

    /// Advances timers and returns the new phase if one was entered.
    pub fn update(&mut self, dt: f32) -> Option<RacePhase> {
        let dt = dt.max(0.0);
        match self.phase {
            RacePhase::Countdown => {
                self.countdown = (self.countdown - dt).max(0.0);
                if self.countdown <= 0.0 {
                    self.phase = RacePhase::Race;
                    self.race_time = 0.0;
                    return Some(RacePhase::Race);
                }
            }
            RacePhase::Race => {
                self.race_time += dt;
            }
            RacePhase::Lobby | RacePhase::Results => {}
        }
        None
    }

    pub fn show_results(&mut self) -> bool {
        if self.phase != RacePhase::Race {
            return false;
        }
        self.phase = RacePhase::Results;
        true
    }

    pub fn abort_to_lobby(&mut self) {
        self.phase = RacePhase::Lobby;
        self.countdown = 0.0;
        self.race_time = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_then_race() {
        let mut director = RaceDirector::new(2.0);
        assert_eq!(director.phase(), RacePhase::Lobby);
        assert_eq!(director.update(1.0), None);

        assert!(director.request_countdown());
        assert!(!director.request_countdown());
        assert_eq!(director.update(1.5), None);
        assert_eq!(director.phase(), RacePhase::Countdown);

        assert_eq!(director.update(0.5), Some(RacePhase::Race));
        assert_eq!(director.race_time(), 0.0);

        director.update(0.25);
        director.update(0.25);
        assert_eq!(director.race_time(), 0.5);
    }

    #[test]
    fn countdown_has_one_second_floor() {
        let mut director = RaceDirector::new(0.0);
        director.request_countdown();
        assert_eq!(director.countdown_remaining(), 1.0);
    }

    #[test]
    fn results_only_from_race() {
        let mut director = RaceDirector::new(1.0);
        assert!(!director.show_results());

        director.request_countdown();
        director.update(1.0);
        assert!(director.show_results());
        assert_eq!(director.phase(), RacePhase::Results);

        director.update(5.0);
        assert_eq!(director.race_time(), 0.0);
    }

    #[test]
    fn abort_resets_clock() {
        let mut director = RaceDirector::new(1.0);
        director.request_countdown();
        director.update(1.0);
        director.update(3.0);

        director.abort_to_lobby();
        assert_eq!(director.phase(), RacePhase::Lobby);
        assert_eq!(director.race_time(), 0.0);
        assert!(director.request_countdown());
    }
}
