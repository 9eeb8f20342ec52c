//! Reconciliation Walkthrough
//!
//! This demo narrates the engine end to end: delta capture on commit,
//! undo through delta inversion, the wire shape, and convergence of two
//! replicas that edited the same scene concurrently.

use std::sync::Arc;

use vellum_core::{Element, ElementId, ElementMap, ErrorPolicy, ObservedAppState, ReplicaId, ShapeKind};
use vellum_delta::{AppStateDelta, ChangeSet, ElementsDelta};
use vellum_reconcile::{reconcile, ParentHint, RemoteElement};
use vellum_test::Replica;

fn main() {
    println!("=== Vellum Synchronization Walkthrough ===\n");

    // 1. Capture a commit as a delta
    println!("1. Delta capture");
    let rect = Element::new(ElementId::new(0xA1), ShapeKind::Rectangle)
        .with_position(10.0, 10.0)
        .with_size(120.0, 80.0);
    let prev: ElementMap = [(rect.id, Arc::new(rect.clone()))].into_iter().collect();
    let next: ElementMap = [(
        rect.id,
        Arc::new(rect.clone().with_position(200.0, 10.0).committed(1)),
    )]
    .into_iter()
    .collect();

    let delta = ElementsDelta::calculate(&prev, &next);
    println!("   moved {} to x=200", rect.id);
    println!("   updated deltas: {}", delta.updated().len());
    println!(
        "   wire shape: {}",
        serde_json::to_string(&delta.to_wire()).expect("wire serialization")
    );

    // 2. Replay and inversion
    println!("\n2. Replay and inversion");
    let (forward, flags) = delta
        .apply_to(&prev, &ElementMap::new(), ErrorPolicy::strict())
        .expect("apply");
    println!(
        "   applied: x={}, visible change: {}",
        forward[&rect.id].x, flags.contains_visible_difference
    );
    let (back, _) = delta
        .inverse()
        .apply_to(&forward, &ElementMap::new(), ErrorPolicy::strict())
        .expect("apply inverse");
    println!("   inverted: x={}", back[&rect.id].x);

    // 3. Observed state follows element deletions
    println!("\n3. Observed-state filtering");
    let selected = ObservedAppState::new().with_selected_elements([rect.id]);
    let app_delta = AppStateDelta::calculate(&ObservedAppState::new(), &selected);
    let deleted_scene: ElementMap = [(
        rect.id,
        Arc::new(rect.clone().deleted().committed(2)),
    )]
    .into_iter()
    .collect();
    let (filtered, visible) = app_delta
        .apply_to(&ObservedAppState::new(), &deleted_scene, ErrorPolicy::strict())
        .expect("apply app-state delta");
    println!(
        "   selecting a deleted element -> selection: {:?}, visible: {}",
        filtered.selected_element_ids, visible
    );

    // 4. Undo/redo through a replica
    println!("\n4. Undo/redo");
    let mut editor = Replica::new(ReplicaId::new(1));
    editor.commit_element(rect.clone());
    editor.commit_element(rect.clone().with_stroke_color("#e03131").committed(3));
    println!("   stroke after commits: {}", editor.elements[&rect.id].stroke_color);
    editor.undo();
    println!("   after undo:  {}", editor.elements[&rect.id].stroke_color);
    editor.redo();
    println!("   after redo:  {}", editor.elements[&rect.id].stroke_color);

    // 5. Convergent merge with parent hints
    println!("\n5. Reconciliation");
    let a = Arc::new(Element::new(ElementId::new(0xA), ShapeKind::Rectangle));
    let b = Arc::new(Element::new(ElementId::new(0xB), ShapeKind::Ellipse));
    let c = Arc::new(Element::new(ElementId::new(0xC), ShapeKind::Diamond));
    let local = vec![a.clone(), b.clone(), c];

    let remote = vec![
        RemoteElement::new(Arc::new(
            Element::new(ElementId::new(0x58), ShapeKind::Text),
        ))
        .with_parent(ParentHint::First),
        RemoteElement::new(Arc::new(
            Element::new(ElementId::new(0x59), ShapeKind::Text),
        ))
        .with_parent(ParentHint::After(a.id)),
        RemoteElement::new(Arc::new(
            Element::new(ElementId::new(0x5A), ShapeKind::Text),
        ))
        .with_parent(ParentHint::After(b.id)),
    ];

    let result = reconcile(&local, &remote);
    let order: Vec<String> = result
        .elements
        .iter()
        .map(|element| format!("{}", element.id))
        .collect();
    println!("   local [A,B,C] + hinted [X first, Y after A, Z after B]");
    println!("   merged order: [{}]", order.join(", "));
    println!(
        "   stats: kept_local={}, took_remote={}, added={}",
        result.stats.kept_local, result.stats.took_remote, result.stats.added
    );

    println!("\nAll replicas running this merge converge on the same scene.");
}
