// End-to-end exercises of the public session API: layer stack invariants,
// undo/redo, magic wand, document round-trips, and composite output.

use capeforge::{
    BlendMode, Color, EditorSession, GradientDirection, KeyCommand, KeyOutcome, LayerContent,
    ShapeKind, Tool,
};
use serde_json::json;

fn red_square() -> LayerContent {
    LayerContent::Shape {
        shape: ShapeKind::Rectangle,
        fill: Color([255, 0, 0, 255]),
        stroke_color: Color::BLACK,
        stroke_width: 0.0,
        sides: 6,
    }
}

#[test]
fn new_session_seeds_one_background_layer() {
    let s = EditorSession::new();
    assert_eq!(s.doc.layers.len(), 1);
    assert!(matches!(
        s.doc.layers[0].content,
        LayerContent::Background { .. }
    ));
    assert_eq!(s.doc.active_layer, Some(s.doc.layers[0].id));
}

#[test]
fn layer_orders_stay_contiguous_through_edits() {
    let mut s = EditorSession::new();
    let a = s.add_layer(red_square(), "a");
    let b = s.add_layer(red_square(), "b");
    let _c = s.add_layer(red_square(), "c");
    s.reorder_layer(b, 0);
    s.delete_layer(a);
    let orders: Vec<u32> = s.doc.layers.iter().map(|l| l.order).collect();
    assert_eq!(orders, vec![0, 1, 2]);
}

#[test]
fn undo_redo_walks_the_edit_sequence() {
    let mut s = EditorSession::new();
    let id = s.add_layer(red_square(), "box");
    s.set_property(id, "opacity", &json!(40));
    assert_eq!(s.doc.layer(id).unwrap().opacity, 40.0);

    s.key(KeyCommand::Undo).unwrap();
    assert_eq!(s.doc.layer(id).unwrap().opacity, 100.0);
    s.key(KeyCommand::Undo).unwrap();
    assert_eq!(s.doc.layers.len(), 1);

    // Floor: further undo is a no-op
    s.key(KeyCommand::Undo).unwrap();
    assert_eq!(s.doc.layers.len(), 1);

    s.key(KeyCommand::Redo).unwrap();
    assert_eq!(s.doc.layers.len(), 2);
    s.key(KeyCommand::Redo).unwrap();
    assert_eq!(s.doc.layer(id).unwrap().opacity, 40.0);
    assert!(!s.history.can_redo());
}

#[test]
fn new_edit_after_undo_discards_the_redo_branch() {
    let mut s = EditorSession::new();
    let id = s.add_layer(red_square(), "box");
    s.set_property(id, "opacity", &json!(40));
    s.key(KeyCommand::Undo).unwrap();
    s.set_property(id, "opacity", &json!(70));
    assert!(!s.history.can_redo());
    assert_eq!(s.doc.layer(id).unwrap().opacity, 70.0);
}

#[test]
fn history_is_capped_at_fifty_snapshots() {
    let mut s = EditorSession::new();
    let id = s.add_layer(red_square(), "box");
    for i in 0..200 {
        s.set_property(id, "x", &json!(i));
    }
    assert!(s.history.undo_count() <= capeforge::history::DEFAULT_HISTORY_CAP);
    // Every undo down to the retained floor still succeeds
    let mut undone = 0;
    while s.history.can_undo() {
        s.key(KeyCommand::Undo).unwrap();
        undone += 1;
    }
    assert_eq!(undone, capeforge::history::DEFAULT_HISTORY_CAP - 1);
}

#[test]
fn locked_layers_reject_edits_and_drags() {
    let mut s = EditorSession::new();
    let id = s.add_layer(red_square(), "box");
    s.doc.set_locked(id, true);
    assert!(!s.set_property(id, "x", &json!(50)));

    s.tool = Tool::Select;
    s.pointer_down(10.0, 10.0);
    s.pointer_move(60.0, 60.0);
    s.pointer_up();
    assert_eq!(s.doc.layer(id).unwrap().transform.x, 0.0);
}

#[test]
fn magic_wand_on_background_selects_full_canvas() {
    let mut s = EditorSession::new();
    s.tool = Tool::Magic;
    s.wand_options.tolerance = 0.0;
    s.pointer_down(100.0, 100.0);
    let sel = s.doc.selection.as_ref().expect("selection");
    assert_eq!(sel.count, (s.doc.width * s.doc.height) as usize);
    assert_eq!(sel.layer, s.doc.active_layer.unwrap());
}

#[test]
fn magic_wand_ignores_pixels_from_other_layers() {
    let mut s = EditorSession::new();
    // A red square sits on top, but the background stays active
    let bg = s.doc.layers[0].id;
    s.add_layer(red_square(), "square");
    s.doc.active_layer = Some(bg);
    s.tool = Tool::Magic;
    s.wand_options.tolerance = 0.0;
    s.pointer_down(50.0, 50.0);
    let sel = s.doc.selection.as_ref().expect("selection");
    // The background is uniform white underneath the square
    assert_eq!(sel.count, (s.doc.width * s.doc.height) as usize);
}

#[test]
fn magic_wand_separates_disjoint_same_color_squares() {
    let mut s = EditorSession::new();
    let id = s.add_layer(
        LayerContent::Image {
            source: String::new(),
            original_width: 0,
            original_height: 0,
            scale: 1.0,
        },
        "squares",
    );
    s.set_property(id, "width", &json!(400));
    s.set_property(id, "height", &json!(400));

    // Two red squares on a blue field, decoded through the session path
    let mut img = image::RgbaImage::from_pixel(400, 400, image::Rgba([0, 0, 200, 255]));
    for y in 40..120 {
        for x in 40..120 {
            img.put_pixel(x, y, image::Rgba([200, 0, 0, 255]));
        }
        for x in 240..320 {
            img.put_pixel(x, y, image::Rgba([200, 0, 0, 255]));
        }
    }
    let mut bytes = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut bytes),
        image::ImageOutputFormat::Png,
    )
    .unwrap();
    s.finish_image_decode(id, &bytes).unwrap();

    s.tool = Tool::Magic;
    s.wand_options.tolerance = 30.0;
    s.pointer_down(80.0, 80.0);
    let sel = s.doc.selection.as_ref().expect("selection");
    assert!(sel.contains(80, 80));
    // The second square is the same color but not connected
    assert!(!sel.contains(280, 80));
    assert!(!sel.contains(180, 80));
    assert_eq!(sel.count, 80 * 80);
}

#[test]
fn save_round_trip_preserves_a_three_layer_document() {
    let mut s = EditorSession::new();
    let shape = s.add_layer(red_square(), "square");
    s.set_property(shape, "blendMode", &json!("screen"));
    s.set_property(shape, "rotation", &json!(30));
    s.add_layer(
        LayerContent::Gradient {
            colors: vec![Color::from_hex("#00CED1").unwrap(), Color::BLACK],
            direction: GradientDirection::Radial,
        },
        "glow",
    );

    let json = match s.key(KeyCommand::Save).unwrap() {
        KeyOutcome::Document(json) => json,
        _ => panic!("save should yield a document"),
    };

    let mut restored = EditorSession::new();
    restored.load(&json).unwrap();
    assert_eq!(restored.doc.layers, s.doc.layers);
    let square = restored
        .doc
        .layers
        .iter()
        .find(|l| l.name == "square")
        .unwrap();
    assert_eq!(square.blend_mode, BlendMode::Screen);
    assert_eq!(square.transform.rotation, 30.0);
    // Loading resets history to a single floor snapshot
    assert!(!restored.history.can_undo());
}

#[test]
fn export_produces_a_decodable_png_of_canvas_size() {
    let mut s = EditorSession::new();
    s.add_layer(red_square(), "square");
    let bytes = match s.key(KeyCommand::Export).unwrap() {
        KeyOutcome::Png(bytes) => bytes,
        _ => panic!("export should yield png bytes"),
    };
    let img = image::load_from_memory(&bytes).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (s.doc.width, s.doc.height));
    // Inside the square: red. Outside: the white background.
    assert_eq!(img.get_pixel(50, 50).0, [255, 0, 0, 255]);
    assert_eq!(img.get_pixel(300, 300).0, [255, 255, 255, 255]);
}

#[test]
fn hidden_and_transparent_layers_leave_the_backdrop() {
    let mut s = EditorSession::new();
    let id = s.add_layer(red_square(), "square");
    s.set_property(id, "visible", &json!(false));
    let img = s.composite();
    assert_eq!(img.get_pixel(50, 50).0, [255, 255, 255, 255]);

    s.set_property(id, "visible", &json!(true));
    s.set_property(id, "opacity", &json!(0));
    let img = s.composite();
    assert_eq!(img.get_pixel(50, 50).0, [255, 255, 255, 255]);
}

#[test]
fn multiply_blend_darkens_against_the_backdrop() {
    let mut s = EditorSession::new();
    let id = s.add_layer(
        LayerContent::Shape {
            shape: ShapeKind::Rectangle,
            fill: Color([100, 150, 200, 255]),
            stroke_color: Color::BLACK,
            stroke_width: 0.0,
            sides: 6,
        },
        "tint",
    );
    s.set_property(id, "blendMode", &json!("multiply"));
    let img = s.composite();
    // Multiply over white is the identity
    assert_eq!(img.get_pixel(50, 50).0, [100, 150, 200, 255]);
}

#[test]
fn deleting_the_active_layer_clears_selection_and_activates_none() {
    let mut s = EditorSession::new();
    let id = s.add_layer(red_square(), "square");
    s.tool = Tool::Magic;
    s.pointer_down(50.0, 50.0);
    assert!(s.doc.selection.is_some());

    s.key(KeyCommand::DeleteActiveLayer).unwrap();
    assert!(s.doc.layer(id).is_none());
    assert!(s.doc.selection.is_none());
    assert_eq!(s.doc.active_layer, None);
    // Deletion is itself undoable
    s.key(KeyCommand::Undo).unwrap();
    assert!(s.doc.layer(id).is_some());
}

#[test]
fn layer_ids_are_never_reused_across_delete_and_undo() {
    let mut s = EditorSession::new();
    let a = s.add_layer(red_square(), "a");
    s.delete_layer(a);
    let b = s.add_layer(red_square(), "b");
    assert!(b.0 > a.0);
    s.key(KeyCommand::Undo).unwrap();
    s.key(KeyCommand::Undo).unwrap();
    let c = s.add_layer(red_square(), "c");
    assert!(c.0 > b.0);
}
