use super::*;
use crate::backend::{MemoryBackend, Operation};
use crate::geometry::{bounding_box_of, BoundingBox};
use eframe::egui::{pos2, vec2};

fn page() -> PageRef {
    PageRef("chapter-1/page-3".into())
}

/// Native 1000x1000 shown at half size, so display deltas double exactly.
fn half_scale() -> Viewport {
    Viewport::new(
        vec2(1000.0, 1000.0),
        Rect::from_min_size(Pos2::ZERO, vec2(500.0, 500.0)),
    )
}

fn square_bubble(id: u64, seq: u32) -> Shape {
    Shape::new(
        ShapeId::Persisted(id),
        seq,
        square_outline(pos2(200.0, 200.0), 100.0),
        BubbleText::default(),
    )
    .unwrap()
}

fn editor_for(backend: &Arc<MemoryBackend>) -> Editor {
    let mut editor = Editor::new(
        backend.clone(),
        page(),
        EditorSettings::default(),
        Dispatch::Inline,
    );
    editor.set_viewport(half_scale());
    editor.reset_shapes(backend.list_shapes(&page()).unwrap());
    editor
}

fn seeded() -> (Arc<MemoryBackend>, Editor) {
    let backend = Arc::new(MemoryBackend::new().with_page(page(), vec![square_bubble(1, 1)]));
    let editor = editor_for(&backend);
    (backend, editor)
}

fn click(editor: &mut Editor, pos: Pos2) {
    editor.pointer_pressed(pos);
    editor.pointer_released(pos);
}

fn drag(editor: &mut Editor, from: Pos2, to: Pos2) {
    editor.pointer_pressed(from);
    editor.pointer_moved(from.lerp(to, 0.5));
    editor.pointer_moved(to);
    editor.pointer_released(to);
}

fn error_count(editor: &Editor) -> usize {
    editor
        .notifications()
        .iter()
        .filter(|n| n.level == NotificationLevel::Error)
        .count()
}

#[test]
fn test_full_bubble_lifecycle() {
    let backend = Arc::new(MemoryBackend::new());
    let mut editor = editor_for(&backend);

    // draw a quad and close it
    editor.set_tool(Tool::Polygon);
    for p in [
        pos2(50.0, 50.0),
        pos2(150.0, 50.0),
        pos2(150.0, 150.0),
        pos2(50.0, 150.0),
    ] {
        click(&mut editor, p);
    }
    assert_eq!(editor.state().polygon_points().len(), 4);
    editor.secondary_clicked(pos2(50.0, 150.0)).unwrap();
    assert_eq!(*editor.state(), InteractionState::Idle);
    assert!(editor.poll_sync());

    let shape = &editor.shapes()[0];
    assert_eq!(shape.id, ShapeId::Persisted(1));
    assert_eq!(shape.sequence_number, 1);
    assert_eq!(shape.bounding_box(), BoundingBox::new(100.0, 100.0, 300.0, 300.0));
    assert_eq!(
        editor.drain_events(),
        vec![EditorEvent::ShapeCreated {
            id: 1,
            sequence_number: 1
        }]
    );

    // edit the translation
    click(&mut editor, pos2(100.0, 100.0));
    editor.double_clicked(pos2(100.0, 100.0));
    assert_eq!(editor.state().editing_shape(), Some(ShapeId::Persisted(1)));
    assert_eq!(editor.selected(), None);
    editor.edit_buffer_mut().unwrap().translated_text = "Hello there".into();
    editor.save_text();
    editor.poll_sync();
    assert_eq!(editor.shapes()[0].text.translated_text, "Hello there");
    assert_eq!(backend.shapes(&page())[0].text.translated_text, "Hello there");
    assert_eq!(editor.drain_events(), vec![EditorEvent::TextSaved { id: 1 }]);

    // select, then pull the top-right vertex 10 native px to the right
    click(&mut editor, pos2(100.0, 100.0));
    assert_eq!(editor.selected(), Some(ShapeId::Persisted(1)));
    drag(&mut editor, pos2(150.0, 50.0), pos2(155.0, 50.0));
    editor.poll_sync();
    let shape = &editor.shapes()[0];
    assert_eq!(shape.outline()[1], pos2(310.0, 100.0));
    assert_eq!(shape.bounding_box(), bounding_box_of(shape.outline()).unwrap());
    assert_eq!(shape.bounding_box().max_x, 310.0);
    assert_eq!(backend.shapes(&page())[0].outline(), shape.outline());
    assert_eq!(editor.drain_events(), vec![EditorEvent::GeometryCommitted { id: 1 }]);

    // delete through the confirmation gate
    editor.key_pressed(Key::Delete);
    assert_eq!(editor.pending_delete_confirmation(), Some(ShapeId::Persisted(1)));
    editor.confirm_delete();
    assert!(editor.shapes().is_empty());
    editor.poll_sync();
    assert_eq!(backend.calls().delete, 1);
    assert!(backend.shapes(&page()).is_empty());
    assert_eq!(editor.drain_events(), vec![EditorEvent::ShapeDeleted { id: 1 }]);
    assert_eq!(error_count(&editor), 0);
}

#[test]
fn test_empty_draft_cancel_creates_nothing() {
    let backend = Arc::new(MemoryBackend::new());
    let mut editor = editor_for(&backend);

    editor.double_clicked(pos2(400.0, 400.0));
    assert_eq!(*editor.state(), InteractionState::EditingDraftText);
    let draft = editor.draft().unwrap();
    assert_eq!(draft.bounding_box(), BoundingBox::new(760.0, 760.0, 840.0, 840.0));

    editor.cancel_text();
    assert!(editor.draft().is_none());
    assert_eq!(*editor.state(), InteractionState::Idle);

    // saving whitespace closes the editor the same way
    editor.double_clicked(pos2(400.0, 400.0));
    editor.edit_buffer_mut().unwrap().translated_text = "   ".into();
    editor.save_text();
    editor.poll_sync();
    assert!(editor.draft().is_none());
    assert_eq!(backend.calls().create, 0);
    assert!(editor.shapes().is_empty());
}

#[test]
fn test_draft_save_creates_with_next_sequence_number() {
    let (backend, mut editor) = seeded();
    editor.double_clicked(pos2(400.0, 400.0));
    // move the draft before saving
    drag(&mut editor, pos2(400.0, 400.0), pos2(410.0, 400.0));
    assert_eq!(*editor.state(), InteractionState::EditingDraftText);
    assert_eq!(editor.draft().unwrap().bounding_box().min_x, 780.0);

    editor.edit_buffer_mut().unwrap().translated_text = "Wait!".into();
    editor.save_text();
    // visible before the backend answers
    assert_eq!(editor.shapes().len(), 2);
    assert!(editor.shapes()[1].id.is_local());
    assert!(editor.draft().is_none());

    editor.poll_sync();
    let created = &editor.shapes()[1];
    assert_eq!(created.id, ShapeId::Persisted(2));
    assert_eq!(created.sequence_number, 2);
    assert_eq!(created.text.translated_text, "Wait!");
    assert_eq!(backend.shapes(&page()).len(), 2);
}

#[test]
fn test_failed_create_restores_draft() {
    let backend = Arc::new(MemoryBackend::new());
    backend.fail_next(Operation::Create);
    let mut editor = editor_for(&backend);

    editor.double_clicked(pos2(100.0, 100.0));
    editor.edit_buffer_mut().unwrap().translated_text = "Keep me".into();
    editor.save_text();
    editor.poll_sync();

    assert!(editor.shapes().is_empty());
    assert_eq!(editor.draft().unwrap().text.translated_text, "Keep me");
    assert_eq!(*editor.state(), InteractionState::EditingDraftText);
    assert_eq!(error_count(&editor), 1);
}

#[test]
fn test_right_click_with_too_few_points() {
    let backend = Arc::new(MemoryBackend::new());
    let mut editor = editor_for(&backend);
    editor.set_tool(Tool::Polygon);
    click(&mut editor, pos2(10.0, 10.0));
    click(&mut editor, pos2(60.0, 10.0));

    let err = editor.secondary_clicked(pos2(60.0, 10.0)).unwrap_err();
    assert_eq!(err, GeometryError::TooFewPoints(2));
    assert_eq!(editor.state().polygon_points().len(), 2);
    assert_eq!(backend.calls().create, 0);
}

#[test]
fn test_backspace_and_escape_while_drawing() {
    let backend = Arc::new(MemoryBackend::new());
    let mut editor = editor_for(&backend);
    editor.set_tool(Tool::Polygon);
    click(&mut editor, pos2(10.0, 10.0));
    click(&mut editor, pos2(60.0, 10.0));
    editor.key_pressed(Key::Backspace);
    assert_eq!(editor.state().polygon_points(), &[pos2(20.0, 20.0)]);
    editor.key_pressed(Key::Escape);
    assert_eq!(*editor.state(), InteractionState::Idle);
}

#[test]
fn test_drawing_polygon_takes_presses_inside_shapes() {
    let (_backend, mut editor) = seeded();
    editor.set_tool(Tool::Polygon);
    click(&mut editor, pos2(10.0, 10.0));
    // inside the seeded bubble, still a polygon point
    click(&mut editor, pos2(100.0, 100.0));
    assert_eq!(editor.state().polygon_points().len(), 2);
    assert_eq!(editor.selected(), None);
}

#[test]
fn test_drag_without_shear_under_non_uniform_scale() {
    let (_backend, mut editor) = seeded();
    editor.set_viewport(Viewport::new(
        vec2(1000.0, 1000.0),
        Rect::from_min_size(Pos2::ZERO, vec2(500.0, 250.0)),
    ));
    let before = editor.shapes()[0].outline().to_vec();
    // native centre (200, 200) is display (100, 50)
    drag(&mut editor, pos2(100.0, 50.0), pos2(110.0, 60.0));
    let after = editor.shapes()[0].outline();
    for (a, b) in before.iter().zip(after) {
        assert_eq!(*b - *a, vec2(20.0, 40.0));
    }
}

#[test]
fn test_plain_click_persists_nothing() {
    let (backend, mut editor) = seeded();
    click(&mut editor, pos2(100.0, 100.0));
    editor.poll_sync();
    assert_eq!(editor.selected(), Some(ShapeId::Persisted(1)));
    assert_eq!(backend.calls().update_geometry, 0);
}

#[test]
fn test_failed_geometry_write_rolls_back() {
    let (backend, mut editor) = seeded();
    let original = editor.shapes()[0].outline().to_vec();
    backend.fail_next(Operation::UpdateGeometry);

    drag(&mut editor, pos2(100.0, 100.0), pos2(120.0, 100.0));
    assert_ne!(editor.shapes()[0].outline(), original.as_slice());
    editor.poll_sync();

    assert_eq!(editor.shapes()[0].outline(), original.as_slice());
    assert_eq!(error_count(&editor), 1);
    assert!(editor.drain_events().is_empty());
}

#[test]
fn test_last_gesture_wins() {
    let (backend, mut editor) = seeded();
    drag(&mut editor, pos2(100.0, 100.0), pos2(110.0, 100.0));
    let first = editor.shapes()[0].outline().to_vec();
    drag(&mut editor, pos2(110.0, 100.0), pos2(120.0, 100.0));
    drag(&mut editor, pos2(120.0, 100.0), pos2(130.0, 100.0));
    let last = editor.shapes()[0].outline().to_vec();

    editor.poll_sync();
    let written: Vec<_> = backend.geometry_writes().into_iter().map(|(_, o)| o).collect();
    assert_eq!(written, vec![first, last.clone()]);
    assert_eq!(backend.shapes(&page())[0].outline(), last.as_slice());
    assert_eq!(editor.shapes()[0].outline(), last.as_slice());
}

#[test]
fn test_failed_delete_reinserts_at_original_index() {
    let backend = Arc::new(MemoryBackend::new().with_page(
        page(),
        vec![
            square_bubble(1, 1),
            Shape::new(
                ShapeId::Persisted(2),
                2,
                square_outline(pos2(700.0, 700.0), 50.0),
                BubbleText::default(),
            )
            .unwrap(),
        ],
    ));
    let mut editor = editor_for(&backend);
    backend.fail_next(Operation::Delete);

    editor.delete_shape(ShapeId::Persisted(1)).unwrap();
    assert_eq!(editor.shapes().len(), 1);
    editor.poll_sync();

    let ids: Vec<_> = editor.shapes().iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![ShapeId::Persisted(1), ShapeId::Persisted(2)]);
    assert_eq!(error_count(&editor), 1);
}

#[test]
fn test_failed_text_save_rolls_back() {
    let (backend, mut editor) = seeded();
    backend.fail_next(Operation::UpdateText);
    editor.double_clicked(pos2(100.0, 100.0));
    editor.edit_buffer_mut().unwrap().translated_text = "Nope".into();
    editor.save_text();
    assert_eq!(editor.shapes()[0].text.translated_text, "Nope");

    editor.poll_sync();
    assert_eq!(editor.shapes()[0].text.translated_text, "");
    assert_eq!(error_count(&editor), 1);
}

#[test]
fn test_escape_restores_vertex_drag() {
    let (_backend, mut editor) = seeded();
    click(&mut editor, pos2(100.0, 100.0));
    let original = editor.shapes()[0].outline().to_vec();
    editor.pointer_pressed(pos2(50.0, 50.0));
    editor.pointer_moved(pos2(20.0, 20.0));
    assert_ne!(editor.shapes()[0].outline(), original.as_slice());
    editor.key_pressed(Key::Escape);
    assert_eq!(editor.shapes()[0].outline(), original.as_slice());
    assert_eq!(*editor.state(), InteractionState::Idle);
}

#[test]
fn test_edits_during_pending_create_follow_up() {
    let backend = Arc::new(MemoryBackend::new());
    let mut editor = editor_for(&backend);
    editor.set_tool(Tool::Polygon);
    for p in [pos2(50.0, 50.0), pos2(150.0, 50.0), pos2(100.0, 150.0)] {
        click(&mut editor, p);
    }
    editor.secondary_clicked(pos2(100.0, 150.0)).unwrap();
    let local = editor.shapes()[0].id;
    assert!(local.is_local());

    // move it before the create result is applied
    drag(&mut editor, pos2(100.0, 80.0), pos2(100.0, 90.0));
    assert_eq!(backend.calls().update_geometry, 0);

    editor.poll_sync();
    assert_eq!(editor.shapes()[0].id, ShapeId::Persisted(1));
    assert_eq!(editor.selected(), Some(ShapeId::Persisted(1)));
    editor.poll_sync();
    assert_eq!(backend.shapes(&page())[0].outline(), editor.shapes()[0].outline());
}

#[test]
fn test_delete_during_pending_create() {
    let backend = Arc::new(MemoryBackend::new());
    let mut editor = editor_for(&backend);
    editor.set_tool(Tool::Polygon);
    for p in [pos2(50.0, 50.0), pos2(150.0, 50.0), pos2(100.0, 150.0)] {
        click(&mut editor, p);
    }
    editor.secondary_clicked(pos2(100.0, 150.0)).unwrap();
    let local = editor.shapes()[0].id;
    editor.delete_shape(local).unwrap();

    editor.poll_sync();
    editor.poll_sync();
    assert!(editor.shapes().is_empty());
    assert!(backend.shapes(&page()).is_empty());
    assert_eq!(backend.calls().delete, 1);
}

#[test]
fn test_export_leaves_state_untouched() {
    let (_backend, mut editor) = seeded();
    click(&mut editor, pos2(100.0, 100.0));
    let revision = editor.revision();
    let state = editor.state().clone();
    let fonts = FontCatalog::new();

    assert!(matches!(
        editor.export_composite(None, &fonts),
        Err(ExportError::NoImage)
    ));
    let page = RgbaImage::from_pixel(1000, 1000, image::Rgba([0, 0, 0, 255]));
    let composite = editor.export_composite(Some(&page), &fonts).unwrap();

    assert_eq!((composite.width, composite.height), (1000, 1000));
    assert_eq!(composite.image.get_pixel(200, 200).0, [255, 255, 255, 255]);
    assert_eq!(editor.revision(), revision);
    assert_eq!(*editor.state(), state);
    assert_eq!(editor.selected(), Some(ShapeId::Persisted(1)));
}

#[test]
fn test_scene_reflects_interaction() {
    let (_backend, mut editor) = seeded();
    editor.pointer_pressed(pos2(100.0, 100.0));
    editor.pointer_moved(pos2(105.0, 100.0));
    let scene = editor.scene();
    assert_eq!(scene.dragging, Some(ShapeId::Persisted(1)));
    assert_eq!(scene.selected, Some(ShapeId::Persisted(1)));
    assert!(scene.polygon.is_empty());
    assert_eq!(scene.hover, None);
}

#[test]
fn test_text_save_behind_failed_save_keeps_latest_text() {
    let (backend, mut editor) = seeded();
    backend.fail_next(Operation::UpdateText);
    for text in ["A", "B"] {
        editor.double_clicked(pos2(100.0, 100.0));
        editor.edit_buffer_mut().unwrap().translated_text = text.into();
        editor.save_text();
    }

    editor.poll_sync();
    assert_eq!(editor.shapes()[0].text.translated_text, "B");
    assert_eq!(backend.shapes(&page())[0].text.translated_text, "B");
    assert_eq!(error_count(&editor), 0);
    assert!(!editor.is_syncing());
}

#[test]
fn test_failed_text_save_rolls_back_to_last_saved_text() {
    let (backend, mut editor) = seeded();
    editor.double_clicked(pos2(100.0, 100.0));
    editor.edit_buffer_mut().unwrap().translated_text = "A".into();
    editor.save_text();
    // the first write has gone out; the second waits for it
    backend.fail_next(Operation::UpdateText);
    editor.double_clicked(pos2(100.0, 100.0));
    editor.edit_buffer_mut().unwrap().translated_text = "B".into();
    editor.save_text();

    editor.poll_sync();
    assert_eq!(editor.shapes()[0].text.translated_text, "A");
    assert_eq!(backend.shapes(&page())[0].text.translated_text, "A");
    assert_eq!(error_count(&editor), 1);
}

#[test]
fn test_failed_delete_restores_despite_new_bubble() {
    let (backend, mut editor) = seeded();
    backend.fail_next(Operation::Delete);
    editor.delete_shape(ShapeId::Persisted(1)).unwrap();

    editor.double_clicked(pos2(400.0, 400.0));
    editor.edit_buffer_mut().unwrap().translated_text = "New".into();
    editor.save_text();
    assert_eq!(editor.shapes()[0].sequence_number, 2);
    editor.poll_sync();
    editor.poll_sync();

    let local: Vec<_> = editor.shapes().iter().map(|s| s.sequence_number).collect();
    let remote: Vec<_> = backend
        .shapes(&page())
        .iter()
        .map(|s| s.sequence_number)
        .collect();
    assert_eq!(local, vec![1, 2]);
    assert_eq!(remote, vec![1, 2]);
    assert!(editor.shape(ShapeId::Persisted(1)).is_some());
}

#[test]
fn test_tap_within_one_frame_ends_the_drag() {
    let (backend, mut editor) = seeded();
    let before = editor.shapes()[0].outline().to_vec();
    editor.pointer_frame(PointerFrame {
        pos: Some(pos2(100.0, 100.0)),
        hovered: true,
        pressed: true,
        released: true,
        ..Default::default()
    });
    assert_eq!(*editor.state(), InteractionState::Idle);
    assert_eq!(editor.selected(), Some(ShapeId::Persisted(1)));

    editor.pointer_frame(PointerFrame {
        pos: Some(pos2(300.0, 300.0)),
        hovered: true,
        ..Default::default()
    });
    assert_eq!(editor.shapes()[0].outline(), before.as_slice());
    assert_eq!(backend.calls().update_geometry, 0);
}

#[test]
fn test_drag_across_frames() {
    let (backend, mut editor) = seeded();
    let frame = |x: f32, pressed: bool, released: bool| PointerFrame {
        pos: Some(pos2(x, 100.0)),
        hovered: true,
        pressed,
        released,
        ..Default::default()
    };
    editor.pointer_frame(frame(100.0, true, false));
    editor.pointer_frame(frame(105.0, false, false));
    editor.pointer_frame(frame(110.0, false, true));
    editor.poll_sync();

    let bounds = editor.shapes()[0].bounding_box();
    assert_eq!(bounds.min_x, 120.0);
    assert_eq!(backend.calls().update_geometry, 1);
    assert_eq!(*editor.state(), InteractionState::Idle);
}

#[test]
fn test_refused_rekey_is_reported() {
    let (_backend, mut editor) = seeded();
    assert!(!editor.rekey(ShapeId::Local(42), ShapeId::Persisted(9), 3));
    assert_eq!(error_count(&editor), 1);
    assert!(editor.shape(ShapeId::Persisted(9)).is_none());
}
