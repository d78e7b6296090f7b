//! Timeline scheduler driving comment activation against a play-head

use crate::active::{Activation, ActiveComment, CommentId};
use crate::allocator::{Footprint, OccupantSource, SpaceAllocator};
use crate::events::{Bounds, Cleared, EngineEvents, Loaded};
use crate::filter::CommentFilter;
use crate::stage::{Size, Stage};
use crate::ticker::TickDriver;
use crate::{EngineConfig, Error, RenderMode, Result};
use danmaku_core::{Comment, Mode, Timeline};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Instant;

/// Active comments keyed by id; ids grow monotonically so iteration follows
/// activation order.
#[derive(Debug, Default)]
struct ActiveSet(BTreeMap<CommentId, ActiveComment>);

impl OccupantSource for ActiveSet {
    fn footprint(&self, id: CommentId) -> Option<Footprint> {
        self.0.get(&id).map(ActiveComment::footprint)
    }
}

/// One allocator per managed movement category
#[derive(Debug)]
struct Allocators {
    scroll: SpaceAllocator,
    scroll_bottom: SpaceAllocator,
    reverse: SpaceAllocator,
    top: SpaceAllocator,
    bottom: SpaceAllocator,
}

impl Allocators {
    fn new(bounds: Size, spacing: f64) -> Self {
        Self {
            scroll: SpaceAllocator::path(bounds, spacing),
            scroll_bottom: SpaceAllocator::path(bounds, spacing),
            reverse: SpaceAllocator::path(bounds, spacing),
            top: SpaceAllocator::anchor(bounds, spacing),
            bottom: SpaceAllocator::anchor(bounds, spacing),
        }
    }

    fn for_mode(&mut self, mode: Mode) -> Option<&mut SpaceAllocator> {
        match mode {
            Mode::ScrollLeft => Some(&mut self.scroll),
            Mode::ScrollBottom => Some(&mut self.scroll_bottom),
            Mode::Reverse => Some(&mut self.reverse),
            Mode::Top => Some(&mut self.top),
            Mode::Bottom => Some(&mut self.bottom),
            _ => None,
        }
    }

    fn get(&self, mode: Mode) -> Option<&SpaceAllocator> {
        match mode {
            Mode::ScrollLeft => Some(&self.scroll),
            Mode::ScrollBottom => Some(&self.scroll_bottom),
            Mode::Reverse => Some(&self.reverse),
            Mode::Top => Some(&self.top),
            Mode::Bottom => Some(&self.bottom),
            _ => None,
        }
    }

    fn set_bounds(&mut self, bounds: Size) {
        for allocator in [
            &mut self.scroll,
            &mut self.scroll_bottom,
            &mut self.reverse,
            &mut self.top,
            &mut self.bottom,
        ] {
            allocator.set_bounds(bounds);
        }
    }
}

/// Schedules timeline records onto a [`Stage`].
///
/// The host reports the media play-head through [`time`](Self::time) and
/// drives animation while the manager is started, either by calling
/// [`tick`](Self::tick) directly or by feeding its clock to
/// [`pump`](Self::pump).
pub struct CommentManager<S: Stage> {
    stage: S,
    config: EngineConfig,
    timeline: Timeline,
    cursor: usize,
    last_time: f64,
    active: ActiveSet,
    allocators: Allocators,
    bounds: Size,
    filter: CommentFilter,
    events: EngineEvents,
    driver: TickDriver,
    next_id: u64,
}

impl<S: Stage> CommentManager<S> {
    /// Creates a stopped manager with an empty timeline
    pub fn new(stage: S, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        if config.render_mode == RenderMode::Transition && !stage.supports_transitions() {
            return Err(Error::UnsupportedRenderMode(config.render_mode));
        }
        let bounds = stage.viewport();
        tracing::debug!(
            width = bounds.width,
            height = bounds.height,
            render_mode = ?config.render_mode,
            "Created comment manager"
        );
        Ok(Self {
            allocators: Allocators::new(bounds, config.lane_spacing),
            driver: TickDriver::new(config.tick_interval),
            stage,
            config,
            timeline: Timeline::new(),
            cursor: 0,
            last_time: 0.0,
            active: ActiveSet::default(),
            bounds,
            filter: CommentFilter::new(),
            events: EngineEvents::default(),
            next_id: 0,
        })
    }

    /// Replaces the timeline and finishes every active comment
    pub fn load(&mut self, records: Vec<Comment>) {
        self.finish_all();
        self.timeline.load(records);
        self.cursor = 0;
        self.last_time = 0.0;
        tracing::debug!(count = self.timeline.len(), "Loaded timeline");
        let payload = Loaded {
            count: self.timeline.len(),
        };
        self.events.load.emit(&payload);
    }

    /// Adds one record, keeping the cursor on the same upcoming record
    pub fn insert(&mut self, record: Comment) -> Result<()> {
        let index = self.timeline.insert(record)?;
        if index <= self.cursor {
            self.cursor += 1;
        }
        if let Some(record) = self.timeline.get(index) {
            self.events.insert.emit(record);
        }
        Ok(())
    }

    /// Moves the cursor to the first record at or after `time_ms` and
    /// finishes every active comment, so none can be activated twice.
    pub fn seek(&mut self, time_ms: f64) -> Result<()> {
        let cursor = self.timeline.seek_index(time_ms)?;
        let finished = self.finish_all();
        self.cursor = cursor;
        tracing::debug!(time_ms, cursor, finished, "Seeked");
        Ok(())
    }

    /// Reports the play-head and activates every record that became due.
    ///
    /// A jump larger than `seek_trigger_ms` clears the active set and
    /// re-seeks. Returns the number of comments activated.
    pub fn time(&mut self, time_ms: f64) -> Result<usize> {
        if (time_ms - self.last_time).abs() > self.config.seek_trigger_ms {
            self.clear();
            self.seek(time_ms)?;
        } else if self.cursor >= self.timeline.len() && time_ms < self.last_time {
            self.seek(time_ms)?;
        }
        self.last_time = time_ms;

        let limit = self.config.concurrency_limit;
        let mut batch = Vec::new();
        while let Some(record) = self.timeline.get(self.cursor) {
            if record.stime > time_ms {
                break;
            }
            self.cursor += 1;
            if limit > 0 && self.active.0.len() + batch.len() >= limit {
                tracing::debug!(stime = record.stime, limit, "Skipped record over concurrency limit");
                continue;
            }
            if self.filter.validate(record) {
                batch.push(Rc::clone(record));
            } else {
                tracing::debug!(stime = record.stime, mode = ?record.mode, "Filtered out record");
            }
        }

        let count = batch.len();
        for record in batch {
            self.activate(record)?;
        }
        Ok(count)
    }

    /// Starts the tick driver and resumes frozen comments
    pub fn start(&mut self) {
        if !self.driver.start() {
            return;
        }
        for comment in self.active.0.values_mut() {
            comment.resume(&mut self.stage);
        }
        tracing::debug!("Started");
    }

    /// Stops the tick driver and freezes every comment in place
    pub fn stop(&mut self) {
        if !self.driver.stop() {
            return;
        }
        for comment in self.active.0.values_mut() {
            comment.freeze(&mut self.stage);
        }
        tracing::debug!("Stopped");
    }

    pub fn is_running(&self) -> bool {
        self.driver.is_running()
    }

    /// Fires a tick if one is due at `now`. Returns whether it ticked.
    pub fn pump(&mut self, now: Instant) -> bool {
        match self.driver.due(now) {
            Some(elapsed_ms) => {
                self.tick(elapsed_ms);
                true
            }
            None => false,
        }
    }

    /// Advances every active comment once; expired comments finish right
    /// after their final update. Does nothing while stopped.
    pub fn tick(&mut self, elapsed_ms: f64) {
        if !self.driver.is_running() {
            return;
        }
        let mut expired = Vec::new();
        for (id, comment) in self.active.0.iter_mut() {
            if comment.update(elapsed_ms, &mut self.stage) {
                expired.push(*id);
            }
        }
        for id in expired {
            self.retire(id);
        }
    }

    /// Finishes every active comment
    pub fn clear(&mut self) {
        let finished = self.finish_all();
        tracing::debug!(finished, "Cleared active comments");
        self.events.clear.emit(&Cleared { finished });
    }

    /// Changes the area used for new placements. Active comments keep their
    /// current geometry.
    pub fn set_bounds(&mut self, width: f64, height: f64) {
        self.bounds = Size::new(width, height);
        self.allocators.set_bounds(self.bounds);
        self.events.resize.emit(&Bounds { width, height });
    }

    pub fn bounds(&self) -> Size {
        self.bounds
    }

    /// Active comments in activation order
    pub fn active(&self) -> impl Iterator<Item = &ActiveComment> {
        self.active.0.values()
    }

    pub fn active_count(&self) -> usize {
        self.active.0.len()
    }

    /// Index of the next record to consider
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn filter(&self) -> &CommentFilter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut CommentFilter {
        &mut self.filter
    }

    pub fn events(&self) -> &EngineEvents {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EngineEvents {
        &mut self.events
    }

    pub fn stage(&self) -> &S {
        &self.stage
    }

    pub fn stage_mut(&mut self) -> &mut S {
        &mut self.stage
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Allocator of a managed category, `None` for unmanaged modes
    pub fn allocator(&self, mode: Mode) -> Option<&SpaceAllocator> {
        self.allocators.get(mode)
    }

    fn activate(&mut self, record: Rc<Comment>) -> Result<()> {
        let record = self.filter.modify(record);
        let mode = record.mode.unwrap_or(Mode::Unknown(0));
        let id = CommentId(self.next_id);
        self.next_id += 1;

        let activation = Activation {
            duration: record.dur * self.config.scale_for(mode),
            opacity_scale: self.config.global_opacity,
            surface: self.bounds,
            render_mode: self.config.render_mode,
        };
        let mut comment = ActiveComment::new(id, record, activation);
        let mounted = comment.mount(
            &mut self.stage,
            self.allocators.for_mode(mode),
            &self.active,
        );
        if let Err(e) = mounted {
            comment.finish(&mut self.stage);
            return Err(e);
        }
        if !self.driver.is_running() {
            comment.freeze(&mut self.stage);
        }
        tracing::debug!(
            id = id.0,
            stime = comment.record().stime,
            mode = %mode,
            lane = ?comment.lane(),
            "Activated comment"
        );

        self.events.enter_comment.emit(&comment);
        self.active.0.insert(id, comment);
        Ok(())
    }

    fn retire(&mut self, id: CommentId) {
        let Some(mut comment) = self.active.0.remove(&id) else {
            return;
        };
        if let Some(allocator) = self.allocators.for_mode(comment.mode()) {
            allocator.remove(id, comment.lane());
        }
        comment.finish(&mut self.stage);
        self.events.exit_comment.emit(&comment);
    }

    fn finish_all(&mut self) -> usize {
        let ids: Vec<CommentId> = self.active.0.keys().copied().collect();
        let count = ids.len();
        for id in ids {
            self.retire(id);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::active::LifecycleState;
    use crate::allocator::Lane;
    use crate::filter::{FilterRule, RuleOp};
    use crate::stage::HeadlessStage;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::time::Duration;

    fn manager() -> CommentManager<HeadlessStage> {
        CommentManager::new(HeadlessStage::new(640.0, 360.0), EngineConfig::default()).unwrap()
    }

    fn scrolling(stime: f64, text: &str) -> Comment {
        Comment::new(stime, Mode::ScrollLeft, text).with_dur(4000.0)
    }

    fn active_stimes(manager: &CommentManager<HeadlessStage>) -> Vec<f64> {
        manager.active().map(|c| c.record().stime).collect()
    }

    #[test]
    fn test_play_scenario() {
        let mut m = manager();
        m.load(vec![scrolling(0.0, "a"), scrolling(1000.0, "b"), scrolling(2000.0, "c")]);

        assert_eq!(m.time(0.0).unwrap(), 1);
        assert_eq!(m.active_count(), 1);
        assert_eq!(m.time(1500.0).unwrap(), 1);
        assert_eq!(m.active_count(), 2);
        assert_eq!(m.time(2000.0).unwrap(), 1);
        assert_eq!(m.active_count(), 3);
        assert_eq!(m.time(6000.0).unwrap(), 0);
        assert_eq!(m.active_count(), 0);
        assert_eq!(m.stage().node_count(), 0);
    }

    #[test]
    fn test_ticks_expire_comments() {
        let mut m = manager();
        m.start();
        m.load(vec![scrolling(0.0, "a"), scrolling(1000.0, "b"), scrolling(2000.0, "c")]);
        let mut now = 0.0;
        while now <= 6000.0 {
            m.time(now).unwrap();
            m.tick(100.0);
            now += 100.0;
        }
        assert_eq!(m.active_count(), 0);
        assert!(m.allocator(Mode::ScrollLeft).unwrap().is_empty());
    }

    #[test]
    fn test_load_sorts_and_resets() {
        let mut m = manager();
        m.load(vec![scrolling(0.0, "old")]);
        m.time(0.0).unwrap();
        assert_eq!(m.active_count(), 1);

        m.load(vec![scrolling(1000.0, "late"), scrolling(500.0, "early")]);
        let order: Vec<f64> = m.timeline().iter().map(|r| r.stime).collect();
        assert_eq!(order, vec![500.0, 1000.0]);
        assert_eq!(m.cursor(), 0);
        assert_eq!(m.active_count(), 0);
    }

    #[test]
    fn test_seek_then_time_activates_in_order() {
        let mut m = manager();
        m.load((0..6).map(|i| scrolling(i as f64 * 500.0, "x")).collect());
        m.seek(1000.0).unwrap();
        assert_eq!(m.cursor(), 2);
        assert_eq!(m.active_count(), 0);

        assert_eq!(m.time(1000.0).unwrap(), 1);
        assert_eq!(m.time(2000.0).unwrap(), 2);
        assert_eq!(active_stimes(&m), vec![1000.0, 1500.0, 2000.0]);
    }

    #[test]
    fn test_seek_finishes_active() {
        let mut m = manager();
        m.load(vec![scrolling(0.0, "a"), scrolling(3000.0, "b")]);
        m.time(0.0).unwrap();
        m.seek(3000.0).unwrap();
        assert_eq!(m.cursor(), 1);
        assert_eq!(m.active_count(), 0);
        assert_eq!(m.stage().node_count(), 0);
        assert!(m.allocator(Mode::ScrollLeft).unwrap().is_empty());
    }

    #[test]
    fn test_seek_back_does_not_duplicate() {
        let mut m = manager();
        m.load(vec![scrolling(0.0, "a"), scrolling(1000.0, "b")]);
        m.time(0.0).unwrap();
        m.time(1000.0).unwrap();
        m.seek(1000.0).unwrap();
        assert_eq!(m.time(1000.0).unwrap(), 1);
        let texts: Vec<&str> = m.active().map(|c| c.record().text.as_str()).collect();
        assert_eq!(texts, vec!["b"]);
    }

    #[test]
    fn test_backwards_reseek_does_not_duplicate() {
        let mut m = manager();
        m.load(vec![scrolling(0.0, "a"), scrolling(1000.0, "b")]);
        m.time(0.0).unwrap();
        m.time(1000.0).unwrap();
        assert_eq!(m.active_count(), 2);

        assert_eq!(m.time(500.0).unwrap(), 0);
        assert_eq!(m.time(1000.0).unwrap(), 1);
        assert_eq!(active_stimes(&m), vec![1000.0]);
    }

    #[test]
    fn test_large_jump_discards_and_reseeks() {
        let mut m = manager();
        m.load((0..10).map(|i| scrolling(i as f64 * 1000.0, "x")).collect());
        m.time(0.0).unwrap();
        assert_eq!(m.time(7000.0).unwrap(), 1);
        assert_eq!(active_stimes(&m), vec![7000.0]);

        assert_eq!(m.time(1000.0).unwrap(), 1);
        assert_eq!(active_stimes(&m), vec![1000.0]);
    }

    #[test]
    fn test_backwards_after_exhaustion_reseeks() {
        let mut m = manager();
        m.load(vec![scrolling(0.0, "a"), scrolling(1000.0, "b")]);
        m.time(0.0).unwrap();
        m.time(1000.0).unwrap();
        m.clear();
        assert_eq!(m.time(1200.0).unwrap(), 0);
        assert_eq!(m.time(900.0).unwrap(), 0);
        assert_eq!(m.cursor(), 1);
        assert_eq!(m.time(1000.0).unwrap(), 1);
    }

    #[test]
    fn test_reject_mode_rule() {
        let mut m = manager();
        m.filter_mut()
            .add_rule(FilterRule::reject("mode", RuleOp::Equals, 8.0).unwrap());
        m.load(vec![
            Comment::new(0.0, Mode::Code, "script"),
            Comment::new(0.0, Mode::ScrollLeft, "scroll"),
            Comment::new(0.0, Mode::Top, "top"),
            Comment::new(0.0, Mode::Positioned, "pos"),
        ]);
        assert_eq!(m.time(0.0).unwrap(), 3);
        assert!(m.active().all(|c| c.mode() != Mode::Code));
        assert_eq!(m.cursor(), 4);
    }

    #[test]
    fn test_insert_shifts_cursor() {
        let mut m = manager();
        m.load(vec![scrolling(0.0, "a"), scrolling(1000.0, "b"), scrolling(2000.0, "c")]);
        m.time(1000.0).unwrap();
        assert_eq!(m.cursor(), 2);

        m.insert(scrolling(500.0, "past")).unwrap();
        assert_eq!(m.cursor(), 3);
        assert_eq!(m.time(1500.0).unwrap(), 0);

        m.insert(scrolling(3000.0, "future")).unwrap();
        assert_eq!(m.cursor(), 3);
        assert_eq!(m.time(3000.0).unwrap(), 2);
    }

    #[test]
    fn test_clear_then_time() {
        let mut m = manager();
        m.load(vec![scrolling(0.0, "a"), scrolling(1000.0, "b"), scrolling(2000.0, "c")]);
        m.time(1500.0).unwrap();
        assert_eq!(m.active_count(), 2);

        m.clear();
        assert_eq!(m.active_count(), 0);
        assert_eq!(m.stage().attached_count(), 0);
        assert_eq!(m.time(2500.0).unwrap(), 1);
        assert_eq!(active_stimes(&m), vec![2000.0]);
    }

    #[test]
    fn test_concurrency_limit_skips_records() {
        let config = EngineConfig {
            concurrency_limit: 2,
            ..EngineConfig::default()
        };
        let mut m = CommentManager::new(HeadlessStage::new(640.0, 360.0), config).unwrap();
        let mut records: Vec<Comment> = (0..4).map(|i| scrolling(0.0, &format!("c{i}"))).collect();
        records.push(scrolling(100.0, "next"));
        m.load(records);
        assert_eq!(m.time(0.0).unwrap(), 2);
        assert_eq!(m.cursor(), 4);

        assert_eq!(m.time(100.0).unwrap(), 0);
        assert_eq!(m.cursor(), 5);
        assert_eq!(m.active_count(), 2);
    }

    #[test]
    fn test_stop_and_start_are_idempotent() {
        let mut m = manager();
        assert!(!m.is_running());
        m.stop();
        m.stop();
        assert!(!m.is_running());

        m.start();
        m.start();
        assert!(m.is_running());
        m.stop();
        m.stop();
        assert!(!m.is_running());
    }

    #[test]
    fn test_tick_is_ignored_while_stopped() {
        let mut m = manager();
        m.load(vec![scrolling(0.0, "a")]);
        m.time(0.0).unwrap();
        let before = m.active().next().unwrap().screen_position();

        m.tick(1000.0);
        let comment = m.active().next().unwrap();
        assert_eq!(comment.screen_position(), before);
        assert_eq!(comment.ttl(), 4000.0);
        assert_eq!(comment.state(), LifecycleState::Mounted);

        m.start();
        m.tick(1000.0);
        assert_eq!(m.active().next().unwrap().ttl(), 3000.0);
    }

    #[test]
    fn test_pump_ticks_at_interval() {
        let mut m = manager();
        m.load(vec![scrolling(0.0, "a")]);
        m.time(0.0).unwrap();
        let t0 = Instant::now();
        assert!(!m.pump(t0));

        m.start();
        assert!(!m.pump(t0));
        assert!(!m.pump(t0 + Duration::from_millis(4)));
        assert!(m.pump(t0 + Duration::from_millis(25)));
        let comment = m.active().next().unwrap();
        assert_eq!(comment.ttl(), 3975.0);
        assert_eq!(comment.state(), LifecycleState::Animating);
    }

    #[test]
    fn test_concurrent_scrolls_never_overlap() {
        let mut m = manager();
        m.start();
        m.load((0..8).map(|i| scrolling(i as f64 * 10.0, "same width")).collect());
        for t in 0..8 {
            m.time(t as f64 * 10.0).unwrap();
            m.tick(10.0);
        }

        let footprints: Vec<Footprint> = m.active().map(ActiveComment::footprint).collect();
        for (i, a) in footprints.iter().enumerate() {
            for b in &footprints[i + 1..] {
                assert!(
                    !(a.overlaps_vertically(b) && a.overlaps_horizontally(b) && a.overlaps_in_time(b)),
                    "{a:?} collides with {b:?}"
                );
            }
        }
        assert!(m.active().all(|c| matches!(c.lane(), Lane::Managed(0))));
    }

    #[test]
    fn test_disjoint_lifetimes_share_top_lane() {
        let mut m = manager();
        m.load(vec![
            Comment::new(0.0, Mode::ScrollLeft, "first").with_dur(1000.0),
            Comment::new(1000.0, Mode::ScrollLeft, "second").with_dur(1000.0),
        ]);
        m.time(0.0).unwrap();
        m.time(1000.0).unwrap();
        assert_eq!(m.active_count(), 2);
        for comment in m.active() {
            assert_eq!(comment.lane(), Lane::Managed(0));
            assert_eq!(comment.position().y, 0.0);
        }
    }

    #[test]
    fn test_lifetime_and_opacity_scaling() {
        let mut config = EngineConfig {
            global_scale: 2.0,
            global_opacity: 0.5,
            ..EngineConfig::default()
        };
        config.category_scale.insert(Mode::Top, 0.5);
        let mut m = CommentManager::new(HeadlessStage::new(640.0, 360.0), config).unwrap();
        m.load(vec![
            scrolling(0.0, "scroll"),
            Comment::new(0.0, Mode::Top, "top").with_dur(4000.0),
        ]);
        m.time(0.0).unwrap();

        let durations: Vec<f64> = m.active().map(ActiveComment::duration).collect();
        assert_eq!(durations, vec![8000.0, 4000.0]);
        let node = m.active().next().unwrap().node().unwrap();
        assert_eq!(m.stage().node(node).unwrap().style.opacity, 0.5);
    }

    #[test]
    fn test_unmanaged_modes_bypass_allocators() {
        let mut m = manager();
        m.load(vec![
            Comment::new(0.0, Mode::Positioned, "p").with_position(10.0, 20.0),
            Comment::new(0.0, Mode::Code, "code"),
        ]);
        m.time(0.0).unwrap();
        assert!(m.active().all(|c| c.lane() == Lane::Unmanaged));
        assert!(m.allocator(Mode::Positioned).is_none());
        assert_eq!(m.active().next().unwrap().position().x, 10.0);
    }

    #[test]
    fn test_events_are_published() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut m = manager();
        {
            let events = m.events_mut();
            let l = Rc::clone(&log);
            events.load.subscribe(move |e| {
                l.borrow_mut().push(format!("load {}", e.count));
                Ok(())
            });
            let l = Rc::clone(&log);
            events.insert.subscribe(move |c| {
                l.borrow_mut().push(format!("insert {}", c.text));
                Ok(())
            });
            let l = Rc::clone(&log);
            events.enter_comment.subscribe(move |c| {
                l.borrow_mut().push(format!("enter {}", c.record().text));
                Ok(())
            });
            let l = Rc::clone(&log);
            events.exit_comment.subscribe(move |c| {
                assert_eq!(c.state(), LifecycleState::Finished);
                l.borrow_mut().push(format!("exit {}", c.record().text));
                Ok(())
            });
            let l = Rc::clone(&log);
            events.clear.subscribe(move |e| {
                l.borrow_mut().push(format!("clear {}", e.finished));
                Ok(())
            });
            let l = Rc::clone(&log);
            events.resize.subscribe(move |b| {
                l.borrow_mut().push(format!("resize {}x{}", b.width, b.height));
                Ok(())
            });
            events.enter_comment.subscribe(|_| anyhow::bail!("broken listener"));
        }

        m.load(vec![scrolling(0.0, "a")]);
        m.insert(scrolling(10.0, "b")).unwrap();
        m.time(10.0).unwrap();
        m.clear();
        m.set_bounds(800.0, 600.0);

        assert_eq!(
            *log.borrow(),
            vec![
                "load 1",
                "insert b",
                "enter a",
                "enter b",
                "exit a",
                "exit b",
                "clear 2",
                "resize 800x600",
            ]
        );
        assert_eq!(m.allocator(Mode::Top).unwrap().bounds(), Size::new(800.0, 600.0));
    }

    #[test]
    fn test_resize_keeps_active_geometry() {
        let mut m = manager();
        m.load(vec![scrolling(0.0, "a")]);
        m.time(0.0).unwrap();
        let before = m.active().next().unwrap().screen_position();
        m.set_bounds(1280.0, 720.0);
        assert_eq!(m.active().next().unwrap().screen_position(), before);
    }

    #[test]
    fn test_transition_mode_requires_stage_support() {
        let config = EngineConfig {
            render_mode: RenderMode::Transition,
            ..EngineConfig::default()
        };
        let err = CommentManager::new(HeadlessStage::new(640.0, 360.0), config.clone()).err();
        assert!(matches!(err, Some(Error::UnsupportedRenderMode(RenderMode::Transition))));

        let m = CommentManager::new(HeadlessStage::new(640.0, 360.0).with_transitions(), config);
        assert!(m.is_ok());
    }

    #[test]
    fn test_native_comments_freeze_while_stopped() {
        let config = EngineConfig {
            render_mode: RenderMode::Transition,
            ..EngineConfig::default()
        };
        let stage = HeadlessStage::new(400.0, 300.0).with_transitions();
        let mut m = CommentManager::new(stage, config).unwrap();
        m.load(vec![Comment::new(0.0, Mode::ScrollLeft, "ab")
            .with_size(10.0)
            .with_dur(1000.0)]);
        m.time(0.0).unwrap();
        let node = m.active().next().unwrap().node().unwrap();

        m.stage_mut().advance(500.0);
        assert_eq!(m.stage().position(node).unwrap().x, 400.0);

        m.start();
        m.stage_mut().advance(500.0);
        m.tick(500.0);
        assert_eq!(m.stage().position(node).unwrap().x, 190.0);

        m.stop();
        m.stage_mut().advance(250.0);
        assert_eq!(m.stage().position(node).unwrap().x, 190.0);
        assert_eq!(m.active().next().unwrap().position().x, 190.0);
    }
}
