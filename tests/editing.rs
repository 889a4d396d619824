//! End-to-end editing sessions through the [`Editor`] and its history.

use approx::assert_abs_diff_eq;
use bevy_math::{Vec2, Vec3};
use brushwork::brushwork_geometry::{BBox3, ChangeBrushFaceAttributesRequest};
use brushwork::commands::TransformObjectsCommand;
use brushwork::{BrushFaceHandle, Editor, EditorConfig, NodeId, NodeKind};

fn editor_with_unit_cube() -> (Editor, NodeId) {
    let mut editor = Editor::new(EditorConfig::default());
    let cube = editor
        .document()
        .build_cuboid(BBox3 {
            min: Vec3::ZERO,
            max: Vec3::ONE,
        })
        .unwrap();
    let id = editor.add_node(NodeKind::brush(cube)).unwrap();
    editor.select(vec![id]);
    (editor, id)
}

// =============================================================================
// Vertex editing
// =============================================================================

#[test]
fn moving_a_corner_keeps_the_cube_convex() {
    let (mut editor, id) = editor_with_unit_cube();
    let corner = Vec3::ONE;
    let delta = Vec3::X;
    let world_bounds = *editor.document().world_bounds();
    assert!(editor.document().brush(id).unwrap().can_move_vertices(&world_bounds, &[corner], delta));

    assert!(editor.move_vertices(&[corner], delta));
    let brush = editor.document().brush(id).unwrap();
    assert_eq!(brush.vertex_count(), 8);
    assert!(brush.has_vertex(corner + delta));
    assert_eq!(brush.bounds().max, Vec3::new(2.0, 1.0, 1.0));
    assert_eq!(brush.bounds().min, Vec3::ZERO);
}

#[test]
fn moving_a_corner_through_the_cube_is_refused() {
    let (mut editor, id) = editor_with_unit_cube();
    let before = editor.document().brush(id).unwrap().clone();
    let generation = editor.document_mut().render_cache(id).unwrap().generation();
    let world_bounds = *editor.document().world_bounds();
    let delta = Vec3::splat(-3.0);
    assert!(!before.can_move_vertices(&world_bounds, &[Vec3::ONE], delta));

    let undo_len = editor.history().undo_len();
    assert!(!editor.move_vertices(&[Vec3::ONE], delta));
    assert_eq!(editor.document().brush(id).unwrap(), &before);
    assert_eq!(editor.history().undo_len(), undo_len);

    let cache = editor.document().brush_node(id).unwrap().render_cache();
    assert!(cache.is_valid());
    assert_eq!(cache.generation(), generation);
}

// =============================================================================
// Textures
// =============================================================================

#[test]
fn resetting_after_rotations_restores_the_axes() {
    let (mut editor, id) = editor_with_unit_cube();
    let top = editor.document().brush(id).unwrap().find_face_by_normal(Vec3::Z).unwrap();
    let handle = BrushFaceHandle::new(id, top);
    editor.select_faces(vec![handle]);

    let system = editor.document().face(handle).unwrap().tex_coord_system().clone();
    for _ in 0..5 {
        assert!(editor.rotate_textures(10.0));
    }
    assert_abs_diff_eq!(editor.document().face(handle).unwrap().attributes().rotation.abs(), 50.0, epsilon = 1e-3);

    let mut request = ChangeBrushFaceAttributesRequest::new();
    request.reset_all();
    assert!(editor.set_face_attributes(request));

    let face = editor.document().face(handle).unwrap();
    assert_eq!(face.attributes().rotation, 0.0);
    assert_abs_diff_eq!(face.tex_coord_system().x_axis().distance(system.x_axis()), 0.0, epsilon = 1e-5);
    assert_abs_diff_eq!(face.tex_coord_system().y_axis().distance(system.y_axis()), 0.0, epsilon = 1e-5);
}

#[test]
fn texture_moves_round_trip() {
    let (mut editor, id) = editor_with_unit_cube();
    let before = editor.document().brush(id).unwrap().clone();
    assert!(editor.move_textures(Vec3::Z, Vec3::X, Vec2::new(8.0, 0.0)));
    assert!(editor.shear_textures(Vec2::new(0.25, 0.0)));
    editor.undo();
    editor.undo();

    for (face, original) in editor.document().brush(id).unwrap().faces().iter().zip(before.faces()) {
        assert_abs_diff_eq!(face.attributes().offset.distance(original.attributes().offset), 0.0, epsilon = 1e-3);
    }
}

// =============================================================================
// Nodes
// =============================================================================

#[test]
fn duplicate_undo_redo_keeps_the_copies() {
    let (mut editor, id) = editor_with_unit_cube();
    let node_count = editor.document().node_count();

    let copies = editor.duplicate_objects();
    assert_eq!(copies.len(), 1);
    assert_eq!(editor.document().node_count(), node_count + 1);

    assert_eq!(editor.undo().as_deref(), Some("Duplicate Objects"));
    assert_eq!(editor.document().node_count(), node_count);
    assert!(editor.document().node(copies[0]).is_none());
    assert_eq!(editor.document().selected_nodes(), &[id]);

    assert!(editor.redo().is_some());
    assert_eq!(editor.document().node_count(), node_count + 1);
    assert_eq!(editor.document().selected_nodes(), copies.as_slice());
    assert_eq!(editor.document().brush(copies[0]), editor.document().brush(id));
}

#[test]
fn duplicating_inside_an_entity_copies_the_entity() {
    let mut editor = Editor::default();
    let entity = editor
        .add_node(NodeKind::entity([("classname", "func_wall")]))
        .unwrap();
    let cube = editor.document().build_cube(16.0).unwrap();
    let brush = editor.add_node_to(entity, NodeKind::brush(cube)).unwrap();
    editor.select(vec![brush]);

    let copies = editor.duplicate_objects();
    let parent = editor.document().node(copies[0]).unwrap().parent().unwrap();
    assert_ne!(parent, entity);
    assert!(matches!(editor.document().node(parent).unwrap().kind(), NodeKind::Entity { .. }));
}

// =============================================================================
// History
// =============================================================================

#[test]
fn undo_redo_round_trip() {
    let (mut editor, id) = editor_with_unit_cube();
    let before = editor.document().brush(id).unwrap().clone();
    let modifications = editor.document().modification_count();

    assert!(editor.rotate_objects(Vec3::splat(0.5), Vec3::Z, 0.3));
    let after = editor.document().brush(id).unwrap().clone();
    assert!(editor.document().is_modified());

    assert_eq!(editor.undo().as_deref(), Some("Rotate Objects"));
    assert_eq!(editor.document().brush(id).unwrap(), &before);
    assert_eq!(editor.document().modification_count(), modifications);

    editor.redo();
    assert_eq!(editor.document().brush(id).unwrap(), &after);
    editor.undo();
    editor.redo();
    assert_eq!(editor.document().brush(id).unwrap(), &after);
}

#[test]
fn consecutive_moves_undo_as_one() {
    let (mut editor, id) = editor_with_unit_cube();
    let undo_len = editor.history().undo_len();
    for _ in 0..3 {
        assert!(editor.translate_objects(Vec3::X * 4.0));
    }
    assert_eq!(editor.history().undo_len(), undo_len + 1);
    assert_eq!(editor.document().brush(id).unwrap().bounds().min.x, 12.0);

    editor.undo();
    assert_eq!(editor.document().brush(id).unwrap().bounds().min.x, 0.0);
}

#[test]
fn transactions_undo_as_one_and_roll_back() {
    let (mut editor, id) = editor_with_unit_cube();
    let undo_len = editor.history().undo_len();

    editor.begin_transaction("Move and Flip");
    editor.translate_objects(Vec3::Y * 2.0);
    editor.flip_objects(Vec3::ZERO, 0);
    assert!(editor.commit_transaction());
    assert_eq!(editor.history().undo_len(), undo_len + 1);
    assert_eq!(editor.undo().as_deref(), Some("Move and Flip"));
    assert_eq!(editor.document().brush(id).unwrap().bounds().max, Vec3::ONE);

    editor.begin_transaction("Scale");
    editor.scale_objects(Vec3::ZERO, Vec3::splat(2.0));
    assert_eq!(editor.document().brush(id).unwrap().bounds().max, Vec3::splat(2.0));
    assert!(editor.rollback_transaction());
    assert_eq!(editor.document().brush(id).unwrap().bounds().max, Vec3::ONE);
    assert_eq!(editor.history().undo_len(), undo_len);
}

#[test]
fn selection_changes_stop_repeat() {
    let (mut editor, id) = editor_with_unit_cube();
    assert!(editor.translate_objects(Vec3::Z * 2.0));
    editor.deselect_all();
    editor.select(vec![id]);
    assert!(!editor.repeat_last_commands());
}

#[test]
fn undo_of_a_vanished_brush_changes_nothing() {
    let (mut editor, id) = editor_with_unit_cube();
    assert!(editor.translate_objects(Vec3::X * 4.0));
    editor.document_mut().perform_remove_nodes(&[id]);
    let node_count = editor.document().node_count();

    assert!(editor.undo().is_none());
    assert!(editor.can_undo());
    assert_eq!(editor.document().node_count(), node_count);
}

#[test]
#[should_panic]
fn zero_translation_panics() {
    TransformObjectsCommand::translate(Vec3::ZERO, true);
}

#[test]
fn refused_rollback_keeps_the_applied_edit() {
    let (mut editor, id) = editor_with_unit_cube();
    let undo_len = editor.history().undo_len();

    editor.begin_transaction("Move");
    assert!(editor.translate_objects(Vec3::X * 4.0));
    editor.document_mut().perform_remove_nodes(&[id]);
    assert!(!editor.rollback_transaction());
    assert_eq!(editor.history().undo_len(), undo_len + 1);
    assert!(editor.can_undo());
}

#[test]
fn degenerate_rotations_are_ignored() {
    let (mut editor, id) = editor_with_unit_cube();
    let undo_len = editor.history().undo_len();
    assert!(!editor.rotate_objects(Vec3::ZERO, Vec3::ZERO, 0.5));
    assert!(!editor.rotate_objects(Vec3::ZERO, Vec3::Z, 0.0));
    assert_eq!(editor.history().undo_len(), undo_len);
    assert_eq!(editor.document().brush(id).unwrap().bounds().max, Vec3::ONE);
}

// =============================================================================
// Far from the origin
// =============================================================================

fn editor_with_cube_at(base: f32) -> (Editor, NodeId) {
    let mut editor = Editor::new(EditorConfig::default());
    let cube = editor
        .document()
        .build_cuboid(BBox3 {
            min: Vec3::splat(base),
            max: Vec3::splat(base + 64.0),
        })
        .unwrap();
    let id = editor.add_node(NodeKind::brush(cube)).unwrap();
    editor.select(vec![id]);
    (editor, id)
}

#[test]
fn far_corner_drag_keeps_the_brush_convex() {
    let (mut editor, id) = editor_with_cube_at(4000.0);
    let corner = Vec3::splat(4064.0);
    let delta = Vec3::ONE.normalize() * 2.0;

    assert!(editor.move_vertices(&[corner], delta));
    let brush = editor.document().brush(id).unwrap();
    assert_eq!(brush.vertex_count(), 8);
    assert_eq!(brush.face_count(), 9);
    assert!(brush.polyhedron().is_closed());
    assert!(brush.polyhedron().is_convex());
}

#[test]
fn far_cube_rotates() {
    let (mut editor, id) = editor_with_cube_at(4000.0);
    let center = Vec3::splat(4032.0);
    assert!(editor.rotate_objects(center, Vec3::Z, 0.5));

    let brush = editor.document().brush(id).unwrap();
    assert_eq!(brush.vertex_count(), 8);
    assert_eq!(brush.face_count(), 6);
    assert!(brush.polyhedron().is_convex());
    assert!(brush.bounds().center().distance(center) < 0.01);

    editor.undo();
    assert_eq!(editor.document().brush(id).unwrap().bounds().min, Vec3::splat(4000.0));
}

#[test]
fn vertex_drag_is_one_undo_step() {
    let (mut editor, id) = editor_with_cube_at(0.0);
    let before = editor.document().brush(id).unwrap().clone();
    let undo_len = editor.history().undo_len();

    let mut corner = Vec3::splat(64.0);
    for _ in 0..4 {
        assert!(editor.move_vertices(&[corner], Vec3::X * 4.0));
        corner += Vec3::X * 4.0;
    }
    assert_eq!(editor.history().undo_len(), undo_len + 1);
    assert!(editor.document().brush(id).unwrap().has_vertex(Vec3::new(80.0, 64.0, 64.0)));

    editor.undo();
    assert_eq!(editor.document().brush(id).unwrap(), &before);
    editor.redo();
    assert!(editor.document().brush(id).unwrap().has_vertex(Vec3::new(80.0, 64.0, 64.0)));
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn config_drives_history_and_texture_lock() {
    let config = EditorConfig::from_json(r#"{ "history_limit": 2, "texture_lock": false }"#).unwrap();
    let mut editor = Editor::new(config);
    let cube = editor.document().build_cube(16.0).unwrap();
    let id = editor.add_node(NodeKind::brush(cube)).unwrap();
    editor.select(vec![id]);
    assert!(!editor.document().config().texture_lock);

    editor.translate_objects(Vec3::X * 16.0);
    editor.rotate_objects(Vec3::ZERO, Vec3::Z, 0.5);
    editor.flip_objects(Vec3::ZERO, 1);
    assert_eq!(editor.history().undo_len(), 2);
}

#[test]
fn missing_config_file_falls_back_to_defaults() {
    let editor = Editor::from_config_file("/nonexistent/brushwork.json").unwrap();
    assert_eq!(editor.document().config(), &EditorConfig::default());
}
