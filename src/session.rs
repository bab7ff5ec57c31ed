//! Open-image sessions and the registry that owns them.
//!
//! A [`Session`] pairs one source image with its mask, history, refinement
//! overlay and pen. The [`SessionRegistry`] holds every open session, the
//! shared palette, and a mask clipboard, and tracks which session is active.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use image::RgbImage;
use thiserror::Error;

use crate::codec::{
    MaskDecodeError, MaskEncodeError, MaskPaths, SaveOutcome, load_image, load_mask,
    save_color_plane, save_mask, write_ids,
};
use crate::config::{AppConfig, ConfigError, LabelDocument, UserPreferences};
use crate::edit::{EditEngine, ViewPoint};
use crate::history::{HistoryExhausted, HistoryStack};
use crate::mask::LabelMask;
use crate::model::{LabelInfo, LabelPalette, PaletteError, Rgb};
use crate::refine::{
    CancelToken, RefineDone, RefineError, RefineJob, RefineOptions, RefineWorker,
    SegmentationRefiner,
};

/// Handle of an open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The source image could not be read
    #[error("Cannot open image: {0}")]
    ImageDecode(#[from] MaskDecodeError),

    /// The mask is being read by a background refinement
    #[error("A refinement is running on this image")]
    RefineInFlight,

    #[error("No session {0}")]
    UnknownSession(SessionId),

    #[error("No image is open")]
    NoActiveSession,

    /// A mask of the wrong size was handed to a session
    #[error("Mask is {found:?} but the image is {expected:?}")]
    SizeMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },

    #[error("Cannot save: {0}")]
    Encode(#[from] MaskEncodeError),

    #[error("Refinement failed: {0}")]
    Refine(#[from] RefineError),

    #[error(transparent)]
    History(#[from] HistoryExhausted),

    #[error(transparent)]
    Palette(#[from] PaletteError),
}

/// One open image with its mask and history.
#[derive(Debug)]
pub struct Session {
    paths: MaskPaths,
    image: Arc<RgbImage>,
    mask: LabelMask,
    /// Last refinement result
    watershed: Option<LabelMask>,
    history: HistoryStack,
    engine: EditEngine,
    stroke_active: bool,
    /// Cancel token of the in-flight background refinement
    refine_cancel: Option<CancelToken>,
}

impl Session {
    /// Open an image and its persisted mask, if any.
    ///
    /// A mask that fails to load, or whose size differs from the image, is
    /// replaced by a blank one.
    pub fn open(
        image_path: &Path,
        palette: &LabelPalette,
        prefs: &UserPreferences,
    ) -> Result<Self, SessionError> {
        let image = load_image(image_path)?;
        let paths = MaskPaths::for_image(image_path, &prefs.mask_extension);
        let mut history = HistoryStack::with_limit(prefs.max_history);

        let blank = || LabelMask::new(image.width(), image.height());
        let mask = if paths.mask.exists() {
            match load_mask(&paths.mask, palette) {
                Ok(mask) if mask.size() == image.dimensions() => {
                    history.commit(mask.clone());
                    mask
                }
                Ok(mask) => {
                    log::warn!(
                        "Mask {:?} is {:?} but the image is {:?}; starting blank",
                        paths.mask,
                        mask.size(),
                        image.dimensions()
                    );
                    blank()
                }
                Err(e) => {
                    log::warn!("{}; starting blank", e);
                    blank()
                }
            }
        } else {
            blank()
        };

        log::info!(
            "Opened {:?} ({}x{})",
            image_path,
            image.width(),
            image.height()
        );
        Ok(Self {
            paths,
            image: Arc::new(image),
            mask,
            watershed: None,
            history,
            engine: EditEngine::new(prefs.pen_size, prefs.scale),
            stroke_active: false,
            refine_cancel: None,
        })
    }

    pub fn paths(&self) -> &MaskPaths {
        &self.paths
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn mask(&self) -> &LabelMask {
        &self.mask
    }

    pub fn watershed(&self) -> Option<&LabelMask> {
        self.watershed.as_ref()
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    pub fn engine(&self) -> &EditEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut EditEngine {
        &mut self.engine
    }

    pub fn set_active_label(&mut self, label: &LabelInfo) {
        self.engine.set_active_label(label);
    }

    /// Whether a background refinement is reading this session's mask.
    pub fn is_refining(&self) -> bool {
        self.refine_cancel.is_some()
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        if self.is_refining() {
            return Err(SessionError::RefineInFlight);
        }
        Ok(())
    }

    /// Press: paint at the pointer and start a stroke.
    pub fn begin_stroke(&mut self, point: ViewPoint) -> Result<(), SessionError> {
        self.ensure_idle()?;
        self.stroke_active = true;
        self.engine.paint_point(&mut self.mask, point);
        Ok(())
    }

    /// Move: paint while a stroke is active, otherwise nothing.
    pub fn continue_stroke(&mut self, point: ViewPoint) -> Result<(), SessionError> {
        self.ensure_idle()?;
        if self.stroke_active {
            self.engine.paint_point(&mut self.mask, point);
        }
        Ok(())
    }

    /// Release: commit the stroke to history.
    pub fn end_stroke(&mut self) {
        if std::mem::take(&mut self.stroke_active) {
            self.history.commit(self.mask.clone());
        }
    }

    /// Replace the label under the pointer by the pen label, mask-wide.
    /// Not recorded in history.
    pub fn swap_label_at(
        &mut self,
        point: ViewPoint,
        palette: &LabelPalette,
    ) -> Result<usize, SessionError> {
        self.ensure_idle()?;
        Ok(self.engine.swap_label_at(&mut self.mask, point, palette))
    }

    /// The label under the pointer.
    ///
    /// The drawn mask answers first and the refinement overlay fills in where
    /// it has nothing. With `prefer_watershed` a label found on the overlay
    /// wins instead.
    pub fn label_at<'p>(
        &self,
        point: ViewPoint,
        palette: &'p LabelPalette,
        prefer_watershed: bool,
    ) -> Option<&'p LabelInfo> {
        let (x, y) = self.engine.to_mask(point)?;
        let from_mask = self.mask.id_at(x, y).and_then(|id| palette.resolve(id));
        let from_watershed = self
            .watershed
            .as_ref()
            .and_then(|w| w.id_at(x, y))
            .and_then(|id| palette.resolve(id));

        if prefer_watershed {
            from_watershed.or(from_mask)
        } else {
            from_mask.or(from_watershed)
        }
    }

    /// Replace the mask by a blank one, as an undoable action.
    pub fn clear_mask(&mut self) -> Result<(), SessionError> {
        let (width, height) = self.image.dimensions();
        self.set_action_mask(LabelMask::new(width, height))
    }

    /// Replace the mask by `mask`, as an undoable action.
    pub fn paste_mask(&mut self, mask: LabelMask) -> Result<(), SessionError> {
        if mask.size() != self.image.dimensions() {
            return Err(SessionError::SizeMismatch {
                expected: self.image.dimensions(),
                found: mask.size(),
            });
        }
        self.set_action_mask(mask)
    }

    fn set_action_mask(&mut self, mask: LabelMask) -> Result<(), SessionError> {
        self.ensure_idle()?;
        self.stroke_active = false;
        self.mask = mask;
        self.history.commit(self.mask.clone());
        Ok(())
    }

    pub fn copy_mask(&self) -> LabelMask {
        self.mask.clone()
    }

    /// Step back one snapshot. A stroke still in progress is committed first.
    pub fn undo(&mut self) -> Result<(), SessionError> {
        self.ensure_idle()?;
        self.end_stroke();
        self.mask = self.history.undo()?.clone();
        Ok(())
    }

    /// Step forward one snapshot. A stroke still in progress is committed
    /// first, which discards the redo branch.
    pub fn redo(&mut self) -> Result<(), SessionError> {
        self.ensure_idle()?;
        self.end_stroke();
        self.mask = self.history.redo()?.clone();
        Ok(())
    }

    pub fn has_unsaved_edits(&self) -> bool {
        self.history.has_unsaved_edits()
    }

    /// Re-derive colors after a palette change.
    pub fn refresh_colors(&mut self, palette: &LabelPalette) {
        self.mask.update_color(palette);
        if let Some(watershed) = &mut self.watershed {
            watershed.update_color(palette);
        }
        self.engine.refresh_pen(palette);
    }

    /// Refine on the calling thread and keep the result as the overlay.
    pub fn refine(
        &mut self,
        refiner: &SegmentationRefiner,
        palette: &LabelPalette,
        options: RefineOptions,
    ) -> Result<(), SessionError> {
        self.ensure_idle()?;
        let result = refiner.run(
            &self.image,
            &self.mask,
            palette,
            options,
            &CancelToken::new(),
        )?;
        self.watershed = Some(result);
        Ok(())
    }

    /// Detach a refinement job and lock the mask until it is finished.
    pub fn refine_job(
        &mut self,
        id: SessionId,
        palette: &LabelPalette,
        options: RefineOptions,
    ) -> Result<RefineJob, SessionError> {
        self.ensure_idle()?;
        let cancel = CancelToken::new();
        self.refine_cancel = Some(cancel.clone());
        Ok(RefineJob {
            session: id,
            image: Arc::clone(&self.image),
            markers: SegmentationRefiner::prepare_markers(&self.mask),
            palette: palette.clone(),
            options,
            cancel,
        })
    }

    /// Unlock the mask and store a background result.
    pub fn finish_refine(
        &mut self,
        result: Result<LabelMask, RefineError>,
    ) -> Result<(), SessionError> {
        self.refine_cancel = None;
        self.watershed = Some(result?);
        Ok(())
    }

    /// Ask the in-flight refinement to stop.
    pub fn cancel_refine(&self) {
        if let Some(token) = &self.refine_cancel {
            token.cancel();
        }
    }

    /// Persist the mask and, when present, the refinement overlay.
    ///
    /// A blank mask is not saved and nothing else is written either. After a
    /// save the history starts over from the persisted state.
    pub fn save(&mut self) -> Result<SaveOutcome, SessionError> {
        let outcome = save_mask(&self.mask, &self.paths.mask)?;
        if outcome == SaveOutcome::SkippedBlank {
            log::warn!("Mask of {:?} is blank, not saved", self.paths.image);
            return Ok(outcome);
        }

        if let Some(watershed) = &self.watershed {
            write_ids(watershed.ids(), &self.paths.watershed)?;
            save_color_plane(watershed.color(), &self.paths.color)?;
        }
        self.history.reset();
        Ok(outcome)
    }
}

/// All open sessions plus the state they share.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: BTreeMap<SessionId, Session>,
    active: Option<SessionId>,
    next_id: u64,
    palette: LabelPalette,
    preferences: UserPreferences,
    clipboard: Option<LabelMask>,
}

impl SessionRegistry {
    pub fn new(palette: LabelPalette, preferences: UserPreferences) -> Self {
        Self {
            sessions: BTreeMap::new(),
            active: None,
            next_id: 0,
            palette,
            preferences,
            clipboard: None,
        }
    }

    /// Registry using the configured preferences and labels.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.palette()?, config.preferences.clone()))
    }

    pub fn palette(&self) -> &LabelPalette {
        &self.palette
    }

    pub fn preferences(&self) -> &UserPreferences {
        &self.preferences
    }

    /// Open an image, or activate its session if it is already open.
    pub fn open(&mut self, image_path: &Path) -> Result<SessionId, SessionError> {
        if let Some((&id, _)) = self
            .sessions
            .iter()
            .find(|(_, session)| session.paths().image == image_path)
        {
            log::debug!("{:?} already open as session {}", image_path, id);
            self.active = Some(id);
            return Ok(id);
        }

        let session = Session::open(image_path, &self.palette, &self.preferences)?;
        let id = SessionId(self.next_id);
        self.next_id += 1;
        self.sessions.insert(id, session);
        self.active = Some(id);
        Ok(id)
    }

    /// Close a session. The lowest remaining id becomes active if the
    /// closed one was.
    pub fn close(&mut self, id: SessionId) -> Option<Session> {
        let session = self.sessions.remove(&id)?;
        session.cancel_refine();
        if self.active == Some(id) {
            self.active = self.sessions.keys().next().copied();
        }
        log::debug!("Closed session {}", id);
        Some(session)
    }

    pub fn get(&self, id: SessionId) -> Result<&Session, SessionError> {
        self.sessions
            .get(&id)
            .ok_or(SessionError::UnknownSession(id))
    }

    pub fn get_mut(&mut self, id: SessionId) -> Result<&mut Session, SessionError> {
        self.sessions
            .get_mut(&id)
            .ok_or(SessionError::UnknownSession(id))
    }

    pub fn active_id(&self) -> Option<SessionId> {
        self.active
    }

    pub fn set_active(&mut self, id: SessionId) -> Result<(), SessionError> {
        self.get(id)?;
        self.active = Some(id);
        Ok(())
    }

    pub fn active(&self) -> Result<&Session, SessionError> {
        let id = self.active.ok_or(SessionError::NoActiveSession)?;
        self.get(id)
    }

    pub fn active_mut(&mut self) -> Result<&mut Session, SessionError> {
        let id = self.active.ok_or(SessionError::NoActiveSession)?;
        self.get_mut(id)
    }

    /// Open session ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.sessions.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions with edits beyond their loaded state.
    pub fn unsaved(&self) -> Vec<SessionId> {
        self.sessions
            .iter()
            .filter(|(_, session)| session.has_unsaved_edits())
            .map(|(&id, _)| id)
            .collect()
    }

    /// Select the pen label of the active session by name.
    pub fn set_active_label(&mut self, name: &str) -> Result<(), SessionError> {
        let id = self.active.ok_or(SessionError::NoActiveSession)?;
        let label = self
            .palette
            .get(name)
            .ok_or_else(|| PaletteError::UnknownLabel {
                name: name.to_string(),
            })?;
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::UnknownSession(id))?;
        session.set_active_label(label);
        Ok(())
    }

    /// Copy the active session's mask to the clipboard.
    pub fn copy_mask(&mut self) -> Result<(), SessionError> {
        let mask = self.active()?.copy_mask();
        self.clipboard = Some(mask);
        Ok(())
    }

    /// Paste the clipboard into the active session. Returns `false` when the
    /// clipboard is empty.
    pub fn paste_mask(&mut self) -> Result<bool, SessionError> {
        let Some(mask) = self.clipboard.clone() else {
            return Ok(false);
        };
        self.active_mut()?.paste_mask(mask)?;
        Ok(true)
    }

    pub fn clipboard(&self) -> Option<&LabelMask> {
        self.clipboard.as_ref()
    }

    /// Replace the palette from a label document and recolor every session.
    ///
    /// An invalid document leaves the current palette in place.
    pub fn replace_palette(&mut self, doc: &LabelDocument) -> Result<(), ConfigError> {
        let palette = doc.to_palette()?;
        self.palette = palette;
        for session in self.sessions.values_mut() {
            session.refresh_colors(&self.palette);
        }
        log::info!("Palette replaced ({} labels)", self.palette.len());
        Ok(())
    }

    /// Parse a label document and replace the palette with it.
    pub fn load_palette_json(&mut self, json: &str) -> Result<(), ConfigError> {
        let doc = LabelDocument::from_json(json).inspect_err(|e| {
            log::warn!("Rejected label document: {}", e);
        })?;
        self.replace_palette(&doc)
    }

    /// The current palette as a label document.
    pub fn palette_document(&self) -> LabelDocument {
        LabelDocument::from_palette(&self.palette)
    }

    /// Change a label color, then recolor every open session.
    pub fn set_label_color(&mut self, name: &str, color: Rgb) -> Result<(), PaletteError> {
        self.palette.set_color(name, color)?;
        for session in self.sessions.values_mut() {
            session.refresh_colors(&self.palette);
        }
        Ok(())
    }

    /// Refine the active session on the calling thread.
    pub fn refine_active(&mut self, refiner: &SegmentationRefiner) -> Result<(), SessionError> {
        let options = RefineOptions {
            remove_border: self.preferences.remove_border,
        };
        let id = self.active.ok_or(SessionError::NoActiveSession)?;
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::UnknownSession(id))?;
        session.refine(refiner, &self.palette, options)
    }

    /// Hand a session's refinement to the worker.
    pub fn submit_refine(
        &mut self,
        id: SessionId,
        worker: &mut RefineWorker,
    ) -> Result<(), SessionError> {
        let options = RefineOptions {
            remove_border: self.preferences.remove_border,
        };
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::UnknownSession(id))?;
        let job = session.refine_job(id, &self.palette, options)?;
        if let Err(e) = worker.submit(job) {
            session.refine_cancel = None;
            return Err(e.into());
        }
        Ok(())
    }

    /// Deliver a finished job to its session.
    ///
    /// Results superseded by a newer job for the same session, and results for
    /// sessions closed in the meantime, are dropped.
    pub fn collect_refine(
        &mut self,
        worker: &RefineWorker,
        done: RefineDone,
    ) -> Result<(), SessionError> {
        if !worker.is_current(&done) {
            log::debug!("Dropping superseded refinement for session {}", done.session);
            return Ok(());
        }
        let Some(session) = self.sessions.get_mut(&done.session) else {
            log::debug!("Dropping refinement for closed session {}", done.session);
            return Ok(());
        };
        session.finish_refine(done.result)
    }

    /// Save a session.
    pub fn save(&mut self, id: SessionId) -> Result<SaveOutcome, SessionError> {
        self.get_mut(id)?.save()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use image::Rgb as Pixel;

    use super::*;
    use crate::constants::BACKGROUND_ID;
    use crate::model::LabelColor;

    fn palette() -> LabelPalette {
        LabelPalette::from_labels([
            LabelInfo::new(1, "sky", "sky", 5, [70, 130, 180]),
            LabelInfo::new(2, "road", "flat", 1, [128, 64, 128]),
        ])
        .unwrap()
    }

    fn prefs() -> UserPreferences {
        UserPreferences {
            pen_size: 3,
            ..UserPreferences::default()
        }
    }

    /// 20x20 image: blue top half, gray bottom half.
    fn write_image(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let image = RgbImage::from_fn(20, 20, |_, y| {
            if y < 10 {
                Pixel([40, 90, 220])
            } else {
                Pixel([90, 90, 90])
            }
        });
        image.save(&path).unwrap();
        path
    }

    fn open(dir: &Path) -> Session {
        let path = write_image(dir, "scene.png");
        let mut session = Session::open(&path, &palette(), &prefs()).unwrap();
        session.set_active_label(palette().get("sky").unwrap());
        session
    }

    #[test]
    fn test_open_without_mask_starts_blank() {
        let dir = tempfile::tempdir().unwrap();
        let session = open(dir.path());

        assert!(session.mask().is_blank());
        assert_eq!(session.mask().size(), (20, 20));
        assert!(session.history().is_empty());
        assert_eq!(
            session.paths().mask,
            dir.path().join("scene_mask.png")
        );
    }

    #[test]
    fn test_open_missing_image() {
        let dir = tempfile::tempdir().unwrap();
        let err = Session::open(&dir.path().join("nope.png"), &palette(), &prefs()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::ImageDecode(MaskDecodeError::NotFound { .. })
        ));
    }

    #[test]
    fn test_stroke_commits_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = open(dir.path());

        session.begin_stroke(ViewPoint::new(5.0, 5.0)).unwrap();
        session.continue_stroke(ViewPoint::new(6.0, 5.0)).unwrap();
        session.continue_stroke(ViewPoint::new(7.0, 5.0)).unwrap();
        assert!(session.history().is_empty());
        session.end_stroke();
        session.end_stroke();

        assert_eq!(session.history().len(), 1);
        assert_eq!(session.mask().id_at(6, 5), Some(1));
        assert_eq!(session.mask().color_at(6, 5), Some([70, 130, 180]));
    }

    #[test]
    fn test_move_without_press_does_not_paint() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = open(dir.path());
        session.continue_stroke(ViewPoint::new(5.0, 5.0)).unwrap();
        assert!(session.mask().is_blank());
    }

    #[test]
    fn test_undo_redo_restores_masks() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = open(dir.path());

        session.begin_stroke(ViewPoint::new(2.0, 2.0)).unwrap();
        session.end_stroke();
        let first = session.copy_mask();
        session.begin_stroke(ViewPoint::new(15.0, 15.0)).unwrap();
        session.end_stroke();
        let second = session.copy_mask();
        assert!(session.has_unsaved_edits());

        session.undo().unwrap();
        assert_eq!(session.mask(), &first);
        assert!(matches!(session.undo(), Err(SessionError::History(_))));
        session.redo().unwrap();
        assert_eq!(session.mask(), &second);
    }

    #[test]
    fn test_clear_and_paste_are_undoable() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = open(dir.path());
        session.begin_stroke(ViewPoint::new(2.0, 2.0)).unwrap();
        session.end_stroke();
        let painted = session.copy_mask();

        session.clear_mask().unwrap();
        assert!(session.mask().is_blank());
        session.undo().unwrap();
        assert_eq!(session.mask(), &painted);

        let wrong = LabelMask::new(5, 5);
        assert!(matches!(
            session.paste_mask(wrong),
            Err(SessionError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_label_at_prefers_mask_then_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let palette = palette();
        let mut session = open(dir.path());
        session.begin_stroke(ViewPoint::new(5.0, 3.0)).unwrap();
        session.end_stroke();
        assert!(session.label_at(ViewPoint::new(5.0, 15.0), &palette, false).is_none());

        let mut road = LabelMask::new(20, 20);
        road.set_pixel(5, 15, LabelColor::new(2, [0, 0, 0]));
        road.set_pixel(5, 3, LabelColor::new(2, [0, 0, 0]));
        session.finish_refine(Ok(road)).unwrap();

        let at = |x: f64, y: f64, prefer: bool| {
            session
                .label_at(ViewPoint::new(x, y), &palette, prefer)
                .map(|l| l.name.clone())
        };
        assert_eq!(at(5.0, 3.0, false).as_deref(), Some("sky"));
        assert_eq!(at(5.0, 15.0, false).as_deref(), Some("road"));
        assert_eq!(at(5.0, 3.0, true).as_deref(), Some("road"));
    }

    #[test]
    fn test_save_blank_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = open(dir.path());

        assert_eq!(session.save().unwrap(), SaveOutcome::SkippedBlank);
        assert!(!session.paths().mask.exists());
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let palette = palette();
        let mut session = open(dir.path());
        session.begin_stroke(ViewPoint::new(4.0, 4.0)).unwrap();
        session.end_stroke();
        session.begin_stroke(ViewPoint::new(4.0, 14.0)).unwrap();
        session.end_stroke();
        session
            .refine(&SegmentationRefiner::default(), &palette, RefineOptions::default())
            .unwrap();

        assert_eq!(session.save().unwrap(), SaveOutcome::Written);
        assert!(session.history().is_empty());
        assert!(!session.has_unsaved_edits());
        assert!(session.paths().watershed.exists());
        assert!(session.paths().color.exists());

        let saved = session.copy_mask();
        let reopened = Session::open(&session.paths().image, &palette, &prefs()).unwrap();
        assert_eq!(reopened.mask().ids(), saved.ids());
        assert_eq!(reopened.history().len(), 1);
        assert!(!reopened.history().can_undo());
    }

    #[test]
    fn test_mismatched_mask_falls_back_to_blank() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_image(dir.path(), "scene.png");
        let mut small = LabelMask::new(4, 4);
        small.set_pixel(0, 0, LabelColor::new(2, [0, 0, 0]));
        save_mask(&small, &dir.path().join("scene_mask.png")).unwrap();

        let session = Session::open(&image, &palette(), &prefs()).unwrap();
        assert!(session.mask().is_blank());
        assert_eq!(session.mask().size(), (20, 20));
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_refine_job_locks_edits() {
        let dir = tempfile::tempdir().unwrap();
        let palette = palette();
        let mut session = open(dir.path());

        let job = session
            .refine_job(SessionId(0), &palette, RefineOptions::default())
            .unwrap();
        assert!(session.is_refining());
        assert!(matches!(
            session.begin_stroke(ViewPoint::new(1.0, 1.0)),
            Err(SessionError::RefineInFlight)
        ));
        assert!(matches!(
            session.refine_job(SessionId(0), &palette, RefineOptions::default()),
            Err(SessionError::RefineInFlight)
        ));

        session.cancel_refine();
        assert!(job.cancel.is_cancelled());
        assert!(session.finish_refine(Err(RefineError::Cancelled)).is_err());
        assert!(!session.is_refining());
        assert!(session.watershed().is_none());
        session.begin_stroke(ViewPoint::new(1.0, 1.0)).unwrap();
    }

    fn registry(dir: &Path) -> (SessionRegistry, PathBuf, PathBuf) {
        let a = write_image(dir, "a.png");
        let b = write_image(dir, "b.png");
        (SessionRegistry::new(palette(), prefs()), a, b)
    }

    #[test]
    fn test_registry_open_and_activate() {
        let dir = tempfile::tempdir().unwrap();
        let (mut registry, a, b) = registry(dir.path());

        let id_a = registry.open(&a).unwrap();
        let id_b = registry.open(&b).unwrap();
        assert_ne!(id_a, id_b);
        assert_eq!(registry.active_id(), Some(id_b));

        assert_eq!(registry.open(&a).unwrap(), id_a);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.active_id(), Some(id_a));

        registry.close(id_a);
        assert_eq!(registry.active_id(), Some(id_b));
        registry.close(id_b);
        assert!(matches!(
            registry.active(),
            Err(SessionError::NoActiveSession)
        ));
        assert!(matches!(
            registry.set_active(id_a),
            Err(SessionError::UnknownSession(_))
        ));
    }

    #[test]
    fn test_registry_clipboard() {
        let dir = tempfile::tempdir().unwrap();
        let (mut registry, a, b) = registry(dir.path());

        let id_a = registry.open(&a).unwrap();
        registry.set_active_label("road").unwrap();
        registry
            .active_mut()
            .unwrap()
            .begin_stroke(ViewPoint::new(10.0, 10.0))
            .unwrap();
        registry.active_mut().unwrap().end_stroke();
        registry.copy_mask().unwrap();

        let id_b = registry.open(&b).unwrap();
        assert!(registry.paste_mask().unwrap());
        assert_eq!(
            registry.get(id_b).unwrap().mask().ids(),
            registry.get(id_a).unwrap().mask().ids()
        );
        assert_eq!(registry.get(id_b).unwrap().history().len(), 1);
    }

    #[test]
    fn test_registry_label_color_two_step() {
        let dir = tempfile::tempdir().unwrap();
        let (mut registry, a, _) = registry(dir.path());
        registry.open(&a).unwrap();
        registry.set_active_label("road").unwrap();
        registry
            .active_mut()
            .unwrap()
            .begin_stroke(ViewPoint::new(10.0, 10.0))
            .unwrap();
        registry.active_mut().unwrap().end_stroke();

        registry.set_label_color("road", [1, 2, 3]).unwrap();
        let session = registry.active().unwrap();
        assert_eq!(session.mask().color_at(10, 10), Some([1, 2, 3]));
        assert_eq!(session.engine().pen().color, [1, 2, 3]);

        assert!(registry.set_label_color("lava", [0, 0, 0]).is_err());
    }

    #[test]
    fn test_registry_rejected_palette_keeps_current() {
        let dir = tempfile::tempdir().unwrap();
        let (mut registry, _, _) = registry(dir.path());
        let before = registry.palette().clone();

        assert!(registry.load_palette_json("{\"labels\": 5}").is_err());
        assert_eq!(registry.palette(), &before);

        let json = r##"{"labels": [
            {"name": "x", "category": "c", "id": 3, "categoryId": 0, "colorHex": "#010101"},
            {"name": "y", "category": "c", "id": 3, "categoryId": 0, "colorHex": "#020202"}
        ]}"##;
        assert!(registry.load_palette_json(json).is_err());
        assert_eq!(registry.palette(), &before);
    }

    #[test]
    fn test_registry_replace_palette_recolors() {
        let dir = tempfile::tempdir().unwrap();
        let (mut registry, a, _) = registry(dir.path());
        registry.open(&a).unwrap();
        registry.set_active_label("sky").unwrap();
        registry
            .active_mut()
            .unwrap()
            .begin_stroke(ViewPoint::new(3.0, 3.0))
            .unwrap();

        let json = r##"{"labels": [
            {"name": "water", "category": "nature", "id": 1, "categoryId": 4, "colorHex": "#0000ff"}
        ]}"##;
        registry.load_palette_json(json).unwrap();
        assert_eq!(registry.palette().len(), 1);
        assert_eq!(
            registry.active().unwrap().mask().color_at(3, 3),
            Some([0, 0, 255])
        );
        assert_eq!(registry.palette_document().labels[0].name, "water");
    }

    #[test]
    fn test_registry_background_refine() {
        let dir = tempfile::tempdir().unwrap();
        let (mut registry, a, _) = registry(dir.path());
        let id = registry.open(&a).unwrap();
        registry.set_active_label("sky").unwrap();
        {
            let session = registry.active_mut().unwrap();
            session.begin_stroke(ViewPoint::new(10.0, 2.0)).unwrap();
            session.end_stroke();
        }
        registry.set_active_label("road").unwrap();
        {
            let session = registry.active_mut().unwrap();
            session.begin_stroke(ViewPoint::new(10.0, 17.0)).unwrap();
            session.end_stroke();
        }

        let mut worker = RefineWorker::spawn(SegmentationRefiner::default()).unwrap();
        registry.submit_refine(id, &mut worker).unwrap();
        assert!(registry.get(id).unwrap().is_refining());

        let done = worker.recv().unwrap();
        registry.collect_refine(&worker, done).unwrap();

        let session = registry.get(id).unwrap();
        assert!(!session.is_refining());
        let watershed = session.watershed().unwrap();
        assert_eq!(watershed.count(BACKGROUND_ID), 0);
        assert_eq!(watershed.id_at(0, 0), Some(1));
        assert_eq!(watershed.id_at(19, 19), Some(2));
    }

    #[test]
    fn test_registry_drops_superseded_refine() {
        let dir = tempfile::tempdir().unwrap();
        let (mut registry, a, _) = registry(dir.path());
        let id = registry.open(&a).unwrap();
        registry.set_active_label("sky").unwrap();
        {
            let session = registry.active_mut().unwrap();
            session.begin_stroke(ViewPoint::new(10.0, 2.0)).unwrap();
            session.end_stroke();
        }

        let mut worker = RefineWorker::spawn(SegmentationRefiner::default()).unwrap();
        registry.submit_refine(id, &mut worker).unwrap();

        // A later job for the same session, submitted straight to the worker,
        // supersedes the registry's job and keeps its result out.
        let session = registry.get(id).unwrap();
        let mut blank_markers = SegmentationRefiner::prepare_markers(session.mask());
        blank_markers.fill(BACKGROUND_ID);
        blank_markers[[0, 0]] = 2;
        worker
            .submit(RefineJob {
                session: id,
                image: Arc::new(session.image().clone()),
                markers: blank_markers,
                palette: registry.palette().clone(),
                options: RefineOptions::default(),
                cancel: CancelToken::new(),
            })
            .unwrap();

        let stale = worker.recv().unwrap();
        registry.collect_refine(&worker, stale).unwrap();
        assert!(registry.get(id).unwrap().watershed().is_none());
        assert!(registry.get(id).unwrap().is_refining());

        let fresh = worker.recv().unwrap();
        registry.collect_refine(&worker, fresh).unwrap();
        let session = registry.get(id).unwrap();
        assert!(!session.is_refining());
        assert_eq!(session.watershed().unwrap().id_at(10, 2), Some(2));
    }

    #[test]
    fn test_undo_during_stroke_keeps_the_stroke_undoable() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = open(dir.path());
        session.begin_stroke(ViewPoint::new(3.0, 3.0)).unwrap();
        session.end_stroke();
        let first = session.mask().clone();

        session.begin_stroke(ViewPoint::new(15.0, 15.0)).unwrap();
        session.undo().unwrap();
        assert_eq!(session.mask(), &first);

        // Releasing after the undo commits nothing more.
        session.end_stroke();
        assert_eq!(session.history().cursor(), 1);
        session.redo().unwrap();
        assert_eq!(session.mask().id_at(15, 15), Some(1));
    }
}
