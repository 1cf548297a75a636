//! crates/valentine_core/src/fireworks.rs
//!
//! Generates the celebration firework show.
//!
//! A show is planned up front as a finite, time-ordered list of spawn and retire
//! events. The caller owns the clock: it asks for the next due time, waits however
//! it likes, then calls [`FireworkShow::advance`] with the elapsed time. Nothing
//! here sleeps, so the schedule can be stepped deterministically in tests.

use std::collections::VecDeque;
use std::f64::consts::TAU;
use std::time::Duration;

use rand::Rng;

/// The colour palette particles are drawn from.
pub const PALETTE: [&str; 6] = [
    "#be123c", "#e11d48", "#fda4af", "#fb7185", "#f43f5e", "#ec4899",
];

/// Tunables for a show. The defaults reproduce the classic ten second show.
#[derive(Debug, Clone, PartialEq)]
pub struct FireworkSettings {
    pub duration: Duration,
    pub interval: Duration,
    /// How long each firework stays on screen after it spawns.
    pub lifetime: Duration,
    pub min_particles: usize,
    /// Extra particles drawn from `0..particle_spread`.
    pub particle_spread: usize,
    pub min_distance: f64,
    pub distance_spread: f64,
    pub min_size: f64,
    pub size_spread: f64,
    /// Fraction of the viewport height, from the top, where fireworks may burst.
    pub sky_fraction: f64,
}

impl Default for FireworkSettings {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(10),
            interval: Duration::from_millis(400),
            lifetime: Duration::from_millis(1500),
            min_particles: 40,
            particle_spread: 20,
            min_distance: 60.0,
            distance_spread: 100.0,
            min_size: 2.0,
            size_spread: 3.0,
            sky_fraction: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FireworkId(pub u64);

/// Hands out firework ids. One allocator per session, never shared globally.
#[derive(Debug, Default)]
pub struct FireworkIds {
    next: u64,
}

impl FireworkIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> FireworkId {
        let id = FireworkId(self.next);
        self.next += 1;
        id
    }
}

/// One spark of a burst. Immutable once created; the renderer animates it from
/// the burst origin to [`Particle::offset`].
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub index: usize,
    /// Radians. Derived from the index so the burst fans out symmetrically.
    pub angle: f64,
    pub distance: f64,
    pub color: &'static str,
    pub size: f64,
}

impl Particle {
    /// The particle's final displacement from the burst origin.
    pub fn offset(&self) -> (f64, f64) {
        (
            self.angle.cos() * self.distance,
            self.angle.sin() * self.distance,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Firework {
    pub id: FireworkId,
    pub x: f64,
    pub y: f64,
    pub particles: Vec<Particle>,
}

/// Creates one burst at a random point in the upper part of the viewport.
pub fn spawn_firework<R: Rng + ?Sized>(
    rng: &mut R,
    ids: &mut FireworkIds,
    viewport: Viewport,
    settings: &FireworkSettings,
) -> Firework {
    let count = settings.min_particles + random_below(rng, settings.particle_spread);
    let particles = (0..count)
        .map(|index| Particle {
            index,
            angle: TAU * index as f64 / count as f64,
            distance: settings.min_distance + rng.gen::<f64>() * settings.distance_spread,
            color: PALETTE[rng.gen_range(0..PALETTE.len())],
            size: settings.min_size + rng.gen::<f64>() * settings.size_spread,
        })
        .collect();

    Firework {
        id: ids.allocate(),
        x: rng.gen::<f64>() * viewport.width,
        y: rng.gen::<f64>() * viewport.height * settings.sky_fraction,
        particles,
    }
}

fn random_below<R: Rng + ?Sized>(rng: &mut R, bound: usize) -> usize {
    if bound == 0 {
        0
    } else {
        rng.gen_range(0..bound)
    }
}

//=========================================================================================
// Show Scheduling
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ShowEvent {
    Spawn(Firework),
    Retire(FireworkId),
}

#[derive(Debug, Clone, PartialEq)]
struct ScheduledEvent {
    at: Duration,
    event: ShowEvent,
}

/// A planned show plus the set of fireworks currently on screen.
#[derive(Debug, Clone)]
pub struct FireworkShow {
    pending: VecDeque<ScheduledEvent>,
    active: Vec<Firework>,
    spawned: usize,
}

impl FireworkShow {
    /// Plans every spawn and retirement of a show.
    ///
    /// Spawns happen at `0, interval, 2*interval, ...` for as long as the offset is
    /// below `duration`. Each firework retires `lifetime` after its own spawn, even
    /// when that falls after the show's last spawn.
    pub fn plan<R: Rng + ?Sized>(
        rng: &mut R,
        ids: &mut FireworkIds,
        viewport: Viewport,
        settings: &FireworkSettings,
    ) -> Self {
        let mut events = Vec::new();
        let mut elapsed = Duration::ZERO;
        while elapsed < settings.duration {
            let firework = spawn_firework(rng, ids, viewport, settings);
            let id = firework.id;
            events.push(ScheduledEvent {
                at: elapsed,
                event: ShowEvent::Spawn(firework),
            });
            events.push(ScheduledEvent {
                at: elapsed + settings.lifetime,
                event: ShowEvent::Retire(id),
            });
            if settings.interval.is_zero() {
                break;
            }
            elapsed += settings.interval;
        }
        // Stable, so events due at the same instant keep their planning order.
        events.sort_by_key(|e| e.at);

        Self {
            pending: events.into(),
            active: Vec::new(),
            spawned: 0,
        }
    }

    /// Offset from the start of the show at which the next event is due.
    pub fn next_due(&self) -> Option<Duration> {
        self.pending.front().map(|e| e.at)
    }

    /// Applies every event due at or before `elapsed` and returns them in order.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<ShowEvent> {
        let mut fired = Vec::new();
        while self.pending.front().is_some_and(|e| e.at <= elapsed) {
            let Some(scheduled) = self.pending.pop_front() else {
                break;
            };
            match &scheduled.event {
                ShowEvent::Spawn(firework) => {
                    self.active.push(firework.clone());
                    self.spawned += 1;
                }
                ShowEvent::Retire(id) => self.active.retain(|f| f.id != *id),
            }
            fired.push(scheduled.event);
        }
        fired
    }

    /// Drops all spawns that have not happened yet. Fireworks already on screen
    /// keep their retirement, so the sky still clears on its own.
    pub fn stop(&mut self) {
        let active = &self.active;
        self.pending.retain(|e| match &e.event {
            ShowEvent::Retire(id) => active.iter().any(|f| f.id == *id),
            ShowEvent::Spawn(_) => false,
        });
    }

    /// Fireworks currently on screen, in spawn order.
    pub fn active(&self) -> &[Firework] {
        &self.active
    }

    pub fn spawned(&self) -> usize {
        self.spawned
    }

    pub fn is_finished(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn planned_show(seed: u64) -> FireworkShow {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut ids = FireworkIds::new();
        FireworkShow::plan(
            &mut rng,
            &mut ids,
            Viewport::default(),
            &FireworkSettings::default(),
        )
    }

    fn drain(show: &mut FireworkShow) -> Vec<(Duration, ShowEvent)> {
        let mut log = Vec::new();
        while let Some(due) = show.next_due() {
            for event in show.advance(due) {
                log.push((due, event));
            }
        }
        log
    }

    #[test]
    fn ten_second_show_spawns_twenty_five_fireworks() {
        let mut show = planned_show(1);
        let log = drain(&mut show);

        let spawns: Vec<_> = log
            .iter()
            .filter(|(_, e)| matches!(e, ShowEvent::Spawn(_)))
            .collect();
        assert_eq!(spawns.len(), 25);
        assert_eq!(show.spawned(), 25);
        assert_eq!(spawns.last().map(|(at, _)| *at), Some(Duration::from_millis(9600)));
        assert!(show.is_finished());
        assert!(show.active().is_empty());
    }

    #[test]
    fn each_firework_retires_after_its_own_lifetime() {
        let mut show = planned_show(2);
        let log = drain(&mut show);

        for (spawned_at, event) in &log {
            let ShowEvent::Spawn(firework) = event else {
                continue;
            };
            let retired_at = log
                .iter()
                .find(|(_, e)| *e == ShowEvent::Retire(firework.id))
                .map(|(at, _)| *at);
            assert_eq!(retired_at, Some(*spawned_at + Duration::from_millis(1500)));
        }
    }

    #[test]
    fn active_set_tracks_spawns_and_retirements() {
        let mut show = planned_show(3);

        show.advance(Duration::from_millis(1000));
        // Spawns at 0, 400 and 800 ms; none has reached 1.5 s yet.
        assert_eq!(show.active().len(), 3);

        show.advance(Duration::from_millis(1600));
        // 1200 and 1600 spawned, the 0 ms firework retired at 1500.
        let ids: Vec<u64> = show.active().iter().map(|f| f.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn late_fireworks_outlive_the_show_window() {
        let mut show = planned_show(4);
        show.advance(Duration::from_secs(10));
        assert_eq!(show.spawned(), 25);
        assert!(!show.active().is_empty());
        assert_eq!(show.next_due(), Some(Duration::from_millis(10_300)));

        show.advance(Duration::from_millis(11_100));
        assert!(show.active().is_empty());
        assert!(show.is_finished());
    }

    #[test]
    fn particles_fan_out_evenly() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut ids = FireworkIds::new();
        let settings = FireworkSettings::default();
        for _ in 0..50 {
            let firework = spawn_firework(&mut rng, &mut ids, Viewport::default(), &settings);
            let count = firework.particles.len();
            assert!((40..60).contains(&count));

            let step = TAU / count as f64;
            for particle in &firework.particles {
                assert!((particle.angle - step * particle.index as f64).abs() < 1e-9);
                assert!((60.0..160.0).contains(&particle.distance));
                assert!((2.0..5.0).contains(&particle.size));
                assert!(PALETTE.contains(&particle.color));
            }
            assert!((0.0..1280.0).contains(&firework.x));
            assert!((0.0..360.0).contains(&firework.y));
        }
    }

    #[test]
    fn stop_cancels_pending_spawns_but_keeps_retirements() {
        let mut show = planned_show(6);
        show.advance(Duration::from_millis(500));
        assert_eq!(show.active().len(), 2);

        show.stop();
        let log = drain(&mut show);
        assert!(log.iter().all(|(_, e)| matches!(e, ShowEvent::Retire(_))));
        assert_eq!(log.len(), 2);
        assert!(show.active().is_empty());
        assert_eq!(show.spawned(), 2);
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let mut ids = FireworkIds::new();
        let a = ids.allocate();
        let b = ids.allocate();
        assert!(a < b);

        let mut fresh = FireworkIds::new();
        assert_eq!(fresh.allocate(), FireworkId(0));
    }
}
