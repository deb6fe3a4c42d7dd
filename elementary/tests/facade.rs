//! Exercises the crate's public surface the way a host embedding it would:
//! only through `elementary::{Runtime, Value}`.

use elementary::{Runtime, Value};

#[test]
fn a_const_feeding_a_root_renders_a_flat_block() {
    let mut rt = Runtime::new(48_000, 16);
    let batch = vec![
        Value::Array(vec![Value::Number(0.0), Value::Number(1.0), Value::String("const".into())]),
        Value::Array(vec![
            Value::Number(3.0),
            Value::Number(1.0),
            Value::String("value".into()),
            Value::Number(0.5),
        ]),
        Value::Array(vec![Value::Number(0.0), Value::Number(2.0), Value::String("root".into())]),
        Value::Array(vec![Value::Number(2.0), Value::Number(2.0), Value::Number(1.0)]),
        Value::Array(vec![Value::Number(4.0), Value::Array(vec![Value::Number(2.0)])]),
        Value::Array(vec![Value::Number(5.0)]),
    ];
    assert_eq!(rt.apply_instructions(&batch), 0);

    let mut out = vec![0.0f32; 16];
    {
        let mut refs: Vec<&mut [f32]> = vec![out.as_mut_slice()];
        rt.process(&mut refs);
    }
    assert!(out.iter().all(|&s| (s - 0.5).abs() < 1e-6));
}
