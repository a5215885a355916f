//! Interaction layer: turns pointer and keyboard input into document edits.
//!
//! The [`Editor`] owns the document store, the undo history, the selection,
//! the active tool and the viewport. Every local edit that should be kept
//! records a history entry and queues an [`EditorEvent::DocumentChanged`],
//! which the session forwards to the sync gateway for autosave and
//! broadcast. The host drains events with [`Editor::take_events`].

use crate::arrange::{self, Alignment, Distribution, GRID_SIZE};
use crate::camera::{Viewport, ZOOM_STEP};
use crate::element::{Element, ElementId, ElementPatch, NewElement, ShapeType, union_bounds};
use crate::history::History;
use crate::input::{KeyEvent, Modifiers, MouseButton, PointerEvent};
use crate::selection::{HANDLE_HIT_TOLERANCE, Marquee, ResizeHandle, SelectionSet, apply_resize, hit_test_handles};
use crate::snapshot::{DocumentSnapshot, Theme, ViewSettings};
use crate::store::{DocumentStore, ObserverId, ReplaceOrigin, StoreChange, StoreError};
use crate::tools::{Command, ToolKind, ToolManager, ToolPrompt, resolve_shortcut};
use kurbo::{Point, Rect, Vec2};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Offset applied to pasted copies, in canvas units.
pub const PASTE_OFFSET: f64 = 20.0;
/// Offset between consecutive uploads dropped together.
pub const UPLOAD_STAGGER: f64 = 20.0;
/// Arrow-key pan step in screen pixels at 100% zoom.
pub const PAN_STEP: f64 = 50.0;

/// Notifications for the host and the sync gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// A local edit changed the document; persist and broadcast it.
    DocumentChanged,
    /// The active tool needs input from the host.
    Prompt(ToolPrompt),
    /// The user asked to save right now.
    SaveRequested,
    /// The user asked for the shortcut overlay.
    ShowShortcuts,
}

/// Pointer gesture in progress.
#[derive(Debug, Clone, Default)]
enum Gesture {
    #[default]
    Idle,
    Panning {
        last: Point,
    },
    Dragging {
        start: Point,
        origins: Vec<(ElementId, Point)>,
        moved: bool,
    },
    Resizing {
        id: ElementId,
        handle: ResizeHandle,
        start: Point,
        start_rect: Rect,
    },
    Marquee(Marquee),
}

/// The canvas editor.
#[derive(Debug)]
pub struct Editor {
    store: DocumentStore,
    history: History,
    selection: SelectionSet,
    tools: ToolManager,
    viewport: Viewport,
    clipboard: Vec<Element>,
    gesture: Gesture,
    snap_to_grid: bool,
    events: Vec<EditorEvent>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(History::default())
    }
}

impl Editor {
    /// Create an editor over an empty document. The empty document is the
    /// first history entry.
    pub fn new(history: History) -> Self {
        let mut editor = Self {
            store: DocumentStore::new(),
            history,
            selection: SelectionSet::new(),
            tools: ToolManager::new(),
            viewport: Viewport::default(),
            clipboard: Vec::new(),
            gesture: Gesture::Idle,
            snap_to_grid: false,
            events: Vec::new(),
        };
        editor.history.reset(editor.store.snapshot());
        editor
    }

    pub fn with_capacity(history_capacity: usize) -> Self {
        Self::new(History::new(history_capacity))
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn tool(&self) -> ToolKind {
        self.tools.current_tool
    }

    pub fn tools(&self) -> &ToolManager {
        &self.tools
    }

    pub fn clipboard(&self) -> &[Element] {
        &self.clipboard
    }

    pub fn snapshot(&self) -> DocumentSnapshot {
        self.store.snapshot()
    }

    pub fn set_snap_to_grid(&mut self, enabled: bool) {
        self.snap_to_grid = enabled;
    }

    /// Register a store change observer for rendering.
    pub fn observe(&mut self, observer: impl FnMut(&StoreChange) + Send + 'static) -> ObserverId {
        self.store.observe(observer)
    }

    pub fn unobserve(&mut self, id: ObserverId) -> bool {
        self.store.unobserve(id)
    }

    /// Drain pending events.
    pub fn take_events(&mut self) -> Vec<EditorEvent> {
        std::mem::take(&mut self.events)
    }

    /// Current marquee rectangle, for drawing.
    pub fn marquee_rect(&self) -> Option<Rect> {
        match &self.gesture {
            Gesture::Marquee(marquee) => Some(marquee.rect()),
            _ => None,
        }
    }

    /// Resize handles of the single selected element, if it can be resized.
    pub fn resize_handles(&self) -> Vec<(ResizeHandle, Point)> {
        self.resizable_selection()
            .map(|element| {
                let bounds = element.bounds();
                ResizeHandle::ALL
                    .into_iter()
                    .map(|handle| (handle, handle.position(bounds)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_interacting(&self) -> bool {
        !matches!(self.gesture, Gesture::Idle)
    }

    fn resizable_selection(&self) -> Option<&Element> {
        if self.selection.len() != 1 {
            return None;
        }
        let id = self.selection.iter().next()?;
        self.store
            .get(id)
            .filter(|element| !element.locked && !element.is_group())
    }

    // ------------------------------------------------------------------
    // Document replacement
    // ------------------------------------------------------------------

    /// Install a freshly loaded document. History restarts from it.
    pub fn load(&mut self, snapshot: DocumentSnapshot) {
        self.viewport.set_zoom(snapshot.settings.zoom);
        self.store.replace(snapshot, ReplaceOrigin::Load);
        self.history.reset(self.store.snapshot());
        self.selection.clear();
        self.gesture = Gesture::Idle;
    }

    /// Install a collaborator's document, keeping the local view settings.
    ///
    /// Not recorded in history.
    pub fn apply_remote(&mut self, snapshot: DocumentSnapshot) {
        let local = DocumentSnapshot::new(snapshot.elements, self.store.settings());
        self.store.replace(local, ReplaceOrigin::Remote);
        self.selection.prune(&self.store);
    }

    fn commit(&mut self) {
        self.history.record(self.store.snapshot());
        self.events.push(EditorEvent::DocumentChanged);
    }

    // ------------------------------------------------------------------
    // Undo / redo
    // ------------------------------------------------------------------

    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(entry) => {
                self.restore(entry);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(entry) => {
                self.restore(entry);
                true
            }
            None => false,
        }
    }

    fn restore(&mut self, entry: Arc<DocumentSnapshot>) {
        let snapshot = DocumentSnapshot::new(entry.elements.clone(), self.store.settings());
        self.store.replace(snapshot, ReplaceOrigin::History);
        self.selection.clear();
        self.gesture = Gesture::Idle;
        self.events.push(EditorEvent::DocumentChanged);
    }

    // ------------------------------------------------------------------
    // Tools
    // ------------------------------------------------------------------

    pub fn set_tool(&mut self, tool: ToolKind) {
        if let Some(prompt) = self.tools.set_tool(tool) {
            self.events.push(EditorEvent::Prompt(prompt));
        }
    }

    /// The host dismissed the shape chooser or file picker.
    pub fn cancel_prompt(&mut self) {
        self.tools.finish();
    }

    /// The host picked a shape: place it at the middle of the view.
    pub fn choose_shape(&mut self, shape_type: ShapeType) -> Result<ElementId, StoreError> {
        let size = shape_type.default_size();
        let center = self.viewport.center();
        let origin = Point::new(center.x - size.width / 2.0, center.y - size.height / 2.0);
        let result = self.create(NewElement::shape(shape_type, origin));
        self.tools.finish();
        result.map(|element| element.id)
    }

    /// Create a text element at a canvas point and return to selecting.
    pub fn create_text(&mut self, at: Point) -> Result<ElementId, StoreError> {
        let result = self.create(NewElement::text(at));
        self.tools.finish();
        result.map(|element| element.id)
    }

    /// Where the `index`-th file of an upload batch goes.
    pub fn upload_origin(&self, drop: Option<Point>, index: usize) -> Point {
        match drop {
            Some(point) => {
                let offset = index as f64 * UPLOAD_STAGGER;
                point + Vec2::new(offset, offset)
            }
            None => self.viewport.center(),
        }
    }

    /// Insert an element as a local edit.
    pub fn create(&mut self, element: NewElement) -> Result<Element, StoreError> {
        let element = self.store.create(element)?;
        self.commit();
        Ok(element)
    }

    // ------------------------------------------------------------------
    // Property edits
    // ------------------------------------------------------------------

    /// Patch one element as a local edit. Unknown ids are ignored.
    pub fn update_element(&mut self, id: &ElementId, patch: &ElementPatch) -> bool {
        if !self.store.update(id, patch) {
            return false;
        }
        self.reconcile_groups();
        self.commit();
        true
    }

    pub fn set_text(&mut self, id: &ElementId, text: &str) -> bool {
        self.update_element(id, &ElementPatch::content(json!(text)))
    }

    pub fn toggle_theme(&mut self) -> Theme {
        let mut settings = self.store.settings();
        settings.theme = settings.theme.toggled();
        self.store.set_settings(settings);
        self.events.push(EditorEvent::DocumentChanged);
        settings.theme
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    pub fn select(&mut self, id: &ElementId, extend: bool) {
        if !self.store.contains(id) {
            return;
        }
        if !extend {
            self.selection.clear();
        }
        self.selection.insert(id.clone());
    }

    pub fn select_all(&mut self) {
        self.selection.set(self.store.ids().cloned());
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Selected ids plus the members of selected groups.
    fn expanded_selection(&self) -> Vec<ElementId> {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for id in self.selection.iter() {
            let Some(element) = self.store.get(id) else {
                continue;
            };
            for candidate in std::iter::once(id.clone()).chain(element.group_members()) {
                if self.store.contains(&candidate) && seen.insert(candidate.clone()) {
                    ids.push(candidate);
                }
            }
        }
        ids
    }

    // ------------------------------------------------------------------
    // Clipboard
    // ------------------------------------------------------------------

    pub fn copy_selected(&mut self) -> usize {
        let ids = self.expanded_selection();
        if ids.is_empty() {
            return 0;
        }
        self.clipboard = ids
            .iter()
            .filter_map(|id| self.store.get(id).cloned())
            .collect();
        log::debug!("Copied {} elements", self.clipboard.len());
        self.clipboard.len()
    }

    /// Paste clipboard copies with fresh ids, offset and on top. The copies
    /// become the selection.
    pub fn paste(&mut self) -> Vec<ElementId> {
        if self.clipboard.is_empty() {
            return Vec::new();
        }

        let mut clip = self.clipboard.clone();
        clip.sort_by_key(|e| e.z_index);

        let remap: HashMap<ElementId, ElementId> = clip
            .iter()
            .map(|e| {
                let id = if e.is_group() {
                    ElementId::generate_group()
                } else {
                    ElementId::generate()
                };
                (e.id.clone(), id)
            })
            .collect();

        let mut created = Vec::with_capacity(clip.len());
        for element in clip {
            let members: Vec<ElementId> = element
                .group_members()
                .iter()
                .filter_map(|m| remap.get(m).cloned())
                .collect();
            let is_group = element.is_group();
            let new_id = remap.get(&element.id).cloned();

            let mut copy = NewElement::from(element);
            copy.id = new_id;
            copy.x += PASTE_OFFSET;
            copy.y += PASTE_OFFSET;
            copy.z_index = None;
            if is_group {
                copy.content = json!({ "elements": members });
            }

            match self.store.create(copy) {
                Ok(element) => created.push(element.id),
                Err(e) => log::warn!("Paste skipped an element: {}", e),
            }
        }

        if !created.is_empty() {
            self.selection.set(created.iter().cloned());
            self.commit();
        }
        created
    }

    pub fn duplicate_selected(&mut self) -> Vec<ElementId> {
        if self.copy_selected() == 0 {
            return Vec::new();
        }
        self.paste()
    }

    // ------------------------------------------------------------------
    // Structural edits
    // ------------------------------------------------------------------

    /// Delete the selection. Deleting a group deletes its members.
    pub fn delete_selected(&mut self) -> usize {
        let ids = self.expanded_selection();
        let removed = ids.iter().filter(|id| self.store.remove(id).is_some()).count();
        self.selection.clear();
        if removed > 0 {
            self.reconcile_groups();
            self.commit();
        }
        removed
    }

    pub fn bring_to_front(&mut self) -> bool {
        let ids = self.selection.to_vec();
        let mut changed = false;
        for id in &ids {
            changed |= self.store.bring_to_front(id);
        }
        if changed {
            self.commit();
        }
        changed
    }

    pub fn send_to_back(&mut self) -> bool {
        let ids = self.selection.to_vec();
        let mut changed = false;
        for id in &ids {
            changed |= self.store.send_to_back(id);
        }
        if changed {
            self.commit();
        }
        changed
    }

    /// Lock or unlock the selection. Locked elements cannot be dragged or
    /// resized.
    pub fn set_locked(&mut self, locked: bool) -> bool {
        let ids = self.selection.to_vec();
        let mut changed = false;
        for id in &ids {
            changed |= self.store.update(id, &ElementPatch::locked(locked));
        }
        if changed {
            self.commit();
        }
        changed
    }

    /// Group the selected non-group elements. Needs at least two.
    pub fn group_selected(&mut self) -> Option<ElementId> {
        let members: Vec<ElementId> = self
            .selection
            .iter()
            .filter(|id| self.store.get(id).is_some_and(|e| !e.is_group()))
            .cloned()
            .collect();
        if members.len() < 2 {
            return None;
        }

        let bounds = union_bounds(members.iter().filter_map(|id| self.store.get(id)))?;
        match self.store.create(NewElement::group(&members, bounds)) {
            Ok(group) => {
                self.selection.set([group.id.clone()]);
                self.commit();
                Some(group.id)
            }
            Err(e) => {
                log::warn!("Failed to create group: {}", e);
                None
            }
        }
    }

    /// Dissolve selected groups; their members become the selection.
    pub fn ungroup_selected(&mut self) -> bool {
        let groups: Vec<Element> = self
            .selection
            .iter()
            .filter_map(|id| self.store.get(id))
            .filter(|e| e.is_group())
            .cloned()
            .collect();
        if groups.is_empty() {
            return false;
        }

        let mut members = Vec::new();
        for group in groups {
            self.store.remove(&group.id);
            members.extend(group.group_members().into_iter().filter(|m| self.store.contains(m)));
        }
        self.selection.set(members);
        self.commit();
        true
    }

    pub fn align_selected(&mut self, alignment: Alignment) -> bool {
        let ids = self.selection.to_vec();
        let elements: Vec<&Element> = ids.iter().filter_map(|id| self.store.get(id)).collect();
        let moves = arrange::align(&elements, alignment);
        self.apply_moves(moves)
    }

    pub fn distribute_selected(&mut self, distribution: Distribution) -> bool {
        let ids = self.selection.to_vec();
        let elements: Vec<&Element> = ids.iter().filter_map(|id| self.store.get(id)).collect();
        let moves = arrange::distribute(&elements, distribution);
        self.apply_moves(moves)
    }

    fn apply_moves(&mut self, moves: Vec<(ElementId, Point)>) -> bool {
        if moves.is_empty() {
            return false;
        }
        for (id, position) in moves {
            self.store.update(&id, &ElementPatch::position(position));
        }
        self.reconcile_groups();
        self.commit();
        true
    }

    /// Keep group frames around their members; drop groups with none left.
    fn reconcile_groups(&mut self) {
        let mut frames = Vec::new();
        let mut empty = Vec::new();
        for group in self.store.iter().filter(|e| e.is_group()) {
            let ids = group.group_members();
            match union_bounds(ids.iter().filter_map(|id| self.store.get(id))) {
                Some(bounds) if bounds != group.bounds() => frames.push((group.id.clone(), bounds)),
                Some(_) => {}
                None => empty.push(group.id.clone()),
            }
        }
        for (id, bounds) in frames {
            self.store.update(&id, &ElementPatch::frame(bounds));
        }
        for id in empty {
            self.store.remove(&id);
            self.selection.remove(&id);
        }
    }

    // ------------------------------------------------------------------
    // Viewport
    // ------------------------------------------------------------------

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
        self.sync_zoom();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
        self.sync_zoom();
    }

    pub fn reset_zoom(&mut self) {
        self.viewport.reset_zoom();
        self.sync_zoom();
    }

    pub fn zoom_to_fit(&mut self) {
        self.viewport.zoom_to_fit(self.store.bounds());
        self.sync_zoom();
    }

    pub fn resize_viewport(&mut self, size: kurbo::Size) {
        self.viewport.resize(size);
    }

    pub fn pan(&mut self, delta: Vec2) {
        self.viewport.pan(delta);
    }

    fn sync_zoom(&mut self) {
        let settings = ViewSettings {
            zoom: self.viewport.zoom,
            ..self.store.settings()
        };
        self.store.set_settings(settings);
    }

    // ------------------------------------------------------------------
    // Keyboard
    // ------------------------------------------------------------------

    /// Handle a key press. Returns true if it mapped to a command.
    pub fn handle_key(&mut self, event: &KeyEvent) -> bool {
        match resolve_shortcut(event) {
            Some(command) => {
                self.execute(command);
                true
            }
            None => false,
        }
    }

    pub fn execute(&mut self, command: Command) {
        match command {
            Command::Undo => {
                self.undo();
            }
            Command::Redo => {
                self.redo();
            }
            Command::Copy => {
                self.copy_selected();
            }
            Command::Paste => {
                self.paste();
            }
            Command::Duplicate => {
                self.duplicate_selected();
            }
            Command::SelectAll => self.select_all(),
            Command::Save => self.events.push(EditorEvent::SaveRequested),
            Command::ZoomIn => self.zoom_in(),
            Command::ZoomOut => self.zoom_out(),
            Command::ResetZoom => self.reset_zoom(),
            Command::Group => {
                self.group_selected();
            }
            Command::Ungroup => {
                self.ungroup_selected();
            }
            Command::DeleteSelection => {
                self.delete_selected();
            }
            Command::Cancel => {
                self.selection.clear();
                self.tools.finish();
                self.gesture = Gesture::Idle;
            }
            Command::SetTool(tool) => self.set_tool(tool),
            Command::Pan(direction) => self.viewport.pan(direction * (PAN_STEP / self.viewport.zoom)),
            Command::ShowShortcuts => self.events.push(EditorEvent::ShowShortcuts),
        }
    }

    // ------------------------------------------------------------------
    // Pointer
    // ------------------------------------------------------------------

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Down {
                position,
                button,
                modifiers,
            } => self.pointer_down(position, button, modifiers),
            PointerEvent::Move { position } => self.pointer_move(position),
            PointerEvent::Up { position, .. } => self.pointer_up(position),
            PointerEvent::Wheel {
                position,
                delta,
                modifiers,
            } => self.wheel(position, delta, modifiers),
        }
    }

    pub fn pointer_down(&mut self, position: Point, button: MouseButton, modifiers: Modifiers) {
        match button {
            MouseButton::Middle => {
                self.gesture = Gesture::Panning { last: position };
                return;
            }
            MouseButton::Right => return,
            MouseButton::Left => {}
        }

        let canvas = self.viewport.screen_to_canvas(position);
        let hit = self.store.element_at(canvas).map(|e| e.id.clone());

        match self.tools.current_tool {
            ToolKind::Select => self.select_down(position, canvas, hit, modifiers),
            ToolKind::Text if hit.is_none() => {
                if let Err(e) = self.create_text(canvas) {
                    log::warn!("Failed to create text element: {}", e);
                }
            }
            ToolKind::Image | ToolKind::Document if hit.is_none() => {
                if let Some(prompt) = self.tools.prompt_on_click() {
                    self.events.push(EditorEvent::Prompt(prompt));
                }
            }
            ToolKind::Text | ToolKind::Image | ToolKind::Document => {}
            ToolKind::Shape => {}
        }
    }

    fn select_down(&mut self, screen: Point, canvas: Point, hit: Option<ElementId>, modifiers: Modifiers) {
        let tolerance = HANDLE_HIT_TOLERANCE / self.viewport.zoom;
        let grabbed = self.resizable_selection().and_then(|element| {
            hit_test_handles(element.bounds(), canvas, tolerance)
                .map(|handle| (element.id.clone(), handle, element.bounds()))
        });
        if let Some((id, handle, start_rect)) = grabbed {
            self.gesture = Gesture::Resizing {
                id,
                handle,
                start: screen,
                start_rect,
            };
            return;
        }

        match hit {
            Some(id) => {
                if modifiers.command() {
                    self.selection.insert(id);
                } else if !self.selection.contains(&id) {
                    self.selection.set([id]);
                }
                self.begin_drag(screen);
            }
            None => {
                let additive = modifiers.command();
                if !additive {
                    self.selection.clear();
                }
                self.gesture = Gesture::Marquee(Marquee::new(canvas, additive, &self.selection));
            }
        }
    }

    fn begin_drag(&mut self, screen: Point) {
        let origins: Vec<(ElementId, Point)> = self
            .expanded_selection()
            .into_iter()
            .filter_map(|id| {
                let element = self.store.get(&id)?;
                (!element.locked).then(|| (id, element.position()))
            })
            .collect();

        self.gesture = if origins.is_empty() {
            Gesture::Idle
        } else {
            Gesture::Dragging {
                start: screen,
                origins,
                moved: false,
            }
        };
    }

    pub fn pointer_move(&mut self, position: Point) {
        match &mut self.gesture {
            Gesture::Idle => {}
            Gesture::Panning { last } => {
                let delta = position - *last;
                *last = position;
                self.viewport.pan(delta);
            }
            Gesture::Dragging { start, origins, moved } => {
                let delta = self.viewport.screen_delta_to_canvas(position - *start);
                for (id, origin) in origins.iter() {
                    let mut target = *origin + delta;
                    if self.snap_to_grid {
                        target = arrange::snap_point(target, GRID_SIZE);
                    }
                    self.store.update(id, &ElementPatch::position(target));
                }
                *moved |= delta != Vec2::ZERO;
            }
            Gesture::Resizing {
                id,
                handle,
                start,
                start_rect,
            } => {
                let delta = self.viewport.screen_delta_to_canvas(position - *start);
                let frame = apply_resize(*handle, *start_rect, delta);
                self.store.update(id, &ElementPatch::frame(frame));
            }
            Gesture::Marquee(marquee) => {
                marquee.current = self.viewport.screen_to_canvas(position);
                self.selection = marquee.selection(&self.store);
            }
        }
    }

    pub fn pointer_up(&mut self, position: Point) {
        self.pointer_move(position);
        match std::mem::take(&mut self.gesture) {
            Gesture::Dragging { moved: true, .. } => {
                self.reconcile_groups();
                self.commit();
            }
            Gesture::Resizing { id, start_rect, .. } => {
                if self.store.get(&id).is_some_and(|e| e.bounds() != start_rect) {
                    self.reconcile_groups();
                    self.commit();
                }
            }
            _ => {}
        }
    }

    pub fn wheel(&mut self, position: Point, delta: Vec2, modifiers: Modifiers) {
        if modifiers.ctrl {
            let factor = if delta.y < 0.0 { ZOOM_STEP } else { 1.0 / ZOOM_STEP };
            self.viewport.zoom_at(position, factor);
            self.sync_zoom();
        } else {
            self.viewport.pan(-delta);
        }
    }
}
