//! Compiled artifacts round-trip through postcard unchanged.

use ozma::{Closure, Segment, Store, compile_unit};
use pretty_assertions::assert_eq;

#[test]
fn segments_round_trip_through_postcard() {
    let mut store = Store::new();
    let compilation = compile_unit("R = {F A B}", &mut store).expect("compiles");

    let bytes = postcard::to_allocvec(&compilation.segment).expect("serializes");
    let restored: Segment = postcard::from_bytes(&bytes).expect("deserializes");
    assert_eq!(compilation.segment, restored);
}

#[test]
fn closures_round_trip_through_postcard() {
    let mut store = Store::new();
    let compilation = compile_unit("proc {$ X Y} X = Y end", &mut store).expect("compiles");
    let closure = store.as_closure(compilation.value).expect("closure result");

    let bytes = postcard::to_allocvec(closure).expect("serializes");
    let restored: Closure = postcard::from_bytes(&bytes).expect("deserializes");
    assert_eq!(closure, &restored);
    assert_eq!(restored.nparams, 2);
}

#[test]
fn empty_segment_serializes() {
    let segment = Segment::new();
    let bytes = postcard::to_allocvec(&segment).expect("serializes");
    let restored: Segment = postcard::from_bytes(&bytes).expect("deserializes");
    assert!(restored.is_empty());
}
