//! Asynchronous persistence of shape changes.
//!
//! Requests run on short-lived worker threads and report back over a
//! channel that the UI thread drains once per frame with [`SyncLayer::poll`].
//! Geometry and text writes for one shape are serialised: while one is in
//! flight a newer one waits, and a still newer one replaces it (last write
//! wins).

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use crate::backend::ShapeBackend;
use crate::error::ApiError;
use crate::geometry::{BoundingBox, Point};
use crate::model::{NewShape, PageRef, Shape, ShapeId, TextUpdate};

/// Called from worker threads when a result is ready, typically
/// `egui::Context::request_repaint`.
pub type RepaintHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Debug)]
pub enum SyncRequest {
    Create {
        local_id: ShapeId,
        shape: NewShape,
    },
    UpdateGeometry {
        id: u64,
        outline: Vec<Point>,
        bounding_box: BoundingBox,
    },
    UpdateText {
        id: u64,
        update: TextUpdate,
    },
    Delete {
        id: u64,
    },
}

#[derive(Debug)]
pub enum SyncOutcome {
    Created {
        local_id: ShapeId,
        sent: NewShape,
        result: Result<Shape, ApiError>,
    },
    GeometryUpdated {
        id: u64,
        outline: Vec<Point>,
        /// A newer write for the same shape was queued behind this one.
        superseded: bool,
        result: Result<(), ApiError>,
    },
    TextUpdated {
        id: u64,
        update: TextUpdate,
        /// A newer write for the same shape was queued behind this one.
        superseded: bool,
        result: Result<(), ApiError>,
    },
    Deleted {
        id: u64,
        result: Result<(), ApiError>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// One worker thread per request.
    Threaded,
    /// Run on the calling thread; results still surface through `poll`.
    Inline,
}

pub struct SyncLayer {
    backend: Arc<dyn ShapeBackend>,
    page: PageRef,
    dispatch: Dispatch,
    results: (Sender<SyncOutcome>, Receiver<SyncOutcome>),
    repaint: Option<RepaintHook>,
    geometry_in_flight: HashSet<u64>,
    geometry_queued: HashMap<u64, (Vec<Point>, BoundingBox)>,
    text_in_flight: HashSet<u64>,
    text_queued: HashMap<u64, TextUpdate>,
    outstanding: usize,
}

impl SyncLayer {
    pub fn new(backend: Arc<dyn ShapeBackend>, page: PageRef, dispatch: Dispatch) -> Self {
        Self {
            backend,
            page,
            dispatch,
            results: mpsc::channel(),
            repaint: None,
            geometry_in_flight: HashSet::new(),
            geometry_queued: HashMap::new(),
            text_in_flight: HashSet::new(),
            text_queued: HashMap::new(),
            outstanding: 0,
        }
    }

    pub fn with_repaint(mut self, hook: RepaintHook) -> Self {
        self.repaint = Some(hook);
        self
    }

    pub fn page(&self) -> &PageRef {
        &self.page
    }

    /// True when no request is in flight or queued.
    pub fn is_idle(&self) -> bool {
        self.outstanding == 0 && self.geometry_queued.is_empty() && self.text_queued.is_empty()
    }

    pub fn create(&mut self, local_id: ShapeId, shape: NewShape) {
        self.dispatch(SyncRequest::Create { local_id, shape });
    }

    pub fn update_geometry(&mut self, id: u64, outline: Vec<Point>, bounding_box: BoundingBox) {
        if self.geometry_in_flight.contains(&id) {
            tracing::debug!(id, "geometry write queued behind in-flight request");
            self.geometry_queued.insert(id, (outline, bounding_box));
            return;
        }
        self.geometry_in_flight.insert(id);
        self.dispatch(SyncRequest::UpdateGeometry {
            id,
            outline,
            bounding_box,
        });
    }

    pub fn update_text(&mut self, id: u64, update: TextUpdate) {
        if self.text_in_flight.contains(&id) {
            tracing::debug!(id, "text write queued behind in-flight request");
            self.text_queued.insert(id, update);
            return;
        }
        self.text_in_flight.insert(id);
        self.dispatch(SyncRequest::UpdateText { id, update });
    }

    pub fn delete(&mut self, id: u64) {
        // a pending geometry write for a deleted shape is pointless
        self.geometry_queued.remove(&id);
        self.text_queued.remove(&id);
        self.dispatch(SyncRequest::Delete { id });
    }

    /// Drains finished requests, releasing queued writes.
    pub fn poll(&mut self) -> Vec<SyncOutcome> {
        let mut finished = Vec::new();
        while let Ok(mut outcome) = self.results.1.try_recv() {
            self.outstanding = self.outstanding.saturating_sub(1);
            match &mut outcome {
                SyncOutcome::GeometryUpdated { id, superseded, .. } => {
                    let id = *id;
                    self.geometry_in_flight.remove(&id);
                    if let Some((outline, bounding_box)) = self.geometry_queued.remove(&id) {
                        *superseded = true;
                        self.update_geometry(id, outline, bounding_box);
                    }
                }
                SyncOutcome::TextUpdated { id, superseded, .. } => {
                    let id = *id;
                    self.text_in_flight.remove(&id);
                    if let Some(update) = self.text_queued.remove(&id) {
                        *superseded = true;
                        self.update_text(id, update);
                    }
                }
                _ => {}
            }
            finished.push(outcome);
        }
        finished
    }

    fn dispatch(&mut self, request: SyncRequest) {
        self.outstanding += 1;
        match self.dispatch {
            Dispatch::Inline => {
                let outcome = execute(self.backend.as_ref(), &self.page, request);
                let _ = self.results.0.send(outcome);
            }
            Dispatch::Threaded => {
                let backend = Arc::clone(&self.backend);
                let page = self.page.clone();
                let tx = self.results.0.clone();
                let repaint = self.repaint.clone();
                let fallback = request.clone();
                let spawned = std::thread::Builder::new()
                    .name("shape-sync".into())
                    .spawn(move || {
                        let outcome = execute(backend.as_ref(), &page, request);
                        let _ = tx.send(outcome);
                        if let Some(repaint) = repaint {
                            repaint();
                        }
                    });
                if let Err(e) = spawned {
                    tracing::warn!("could not spawn sync worker ({}), running inline", e);
                    let outcome = execute(self.backend.as_ref(), &self.page, fallback);
                    let _ = self.results.0.send(outcome);
                }
            }
        }
    }
}

fn execute(backend: &dyn ShapeBackend, page: &PageRef, request: SyncRequest) -> SyncOutcome {
    match request {
        SyncRequest::Create { local_id, shape } => {
            let result = backend.create_shape(page, &shape);
            SyncOutcome::Created {
                local_id,
                sent: shape,
                result,
            }
        }
        SyncRequest::UpdateGeometry {
            id,
            outline,
            bounding_box,
        } => {
            let result = backend.update_shape_geometry(id, &outline, bounding_box);
            SyncOutcome::GeometryUpdated {
                id,
                outline,
                superseded: false,
                result,
            }
        }
        SyncRequest::UpdateText { id, update } => {
            let result = backend.update_shape_text(id, &update);
            SyncOutcome::TextUpdated {
                id,
                update,
                superseded: false,
                result,
            }
        }
        SyncRequest::Delete { id } => SyncOutcome::Deleted {
            id,
            result: backend.delete_shape(id),
        },
    }
}
