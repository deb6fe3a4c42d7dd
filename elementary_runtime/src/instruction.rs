//! Decodes the six wire-format instruction opcodes (spec §4.1, §6.1) out of
//! a `Value::Array`. Every instruction is `[opcode, ...args]`; a malformed
//! shape or wrong argument type is `ErrorCode::InvalidInstructionFormat`,
//! never a panic — instructions arrive off a (possibly untrusted) client.

use elementary_core::{ErrorCode, NodeId};
use elementary_primitives::{Name, Value};

#[derive(Debug, Clone)]
pub enum Instruction {
    CreateNode { id: NodeId, kind: Name },
    DeleteNode { id: NodeId },
    AppendChild { parent: NodeId, child: NodeId },
    SetProperty { id: NodeId, key: Name, value: Value },
    ActivateRoots { ids: Vec<NodeId> },
    CommitUpdates,
}

fn arg(arr: &[Value], i: usize) -> Result<&Value, ErrorCode> {
    arr.get(i).ok_or(ErrorCode::InvalidInstructionFormat)
}

fn node_id(arr: &[Value], i: usize) -> Result<NodeId, ErrorCode> {
    arg(arr, i)?.as_i32().ok_or(ErrorCode::InvalidInstructionFormat)
}

impl Instruction {
    pub fn decode(value: &Value) -> Result<Self, ErrorCode> {
        let arr = value.as_array().ok_or(ErrorCode::InvalidInstructionFormat)?;
        let opcode = arg(arr, 0)?.as_i32().ok_or(ErrorCode::InvalidInstructionFormat)?;
        match opcode {
            0 => {
                let id = node_id(arr, 1)?;
                let kind = arg(arr, 2)?.as_str().ok_or(ErrorCode::InvalidInstructionFormat)?;
                Ok(Instruction::CreateNode { id, kind: Name::from(kind) })
            }
            1 => Ok(Instruction::DeleteNode { id: node_id(arr, 1)? }),
            2 => Ok(Instruction::AppendChild {
                parent: node_id(arr, 1)?,
                child: node_id(arr, 2)?,
            }),
            3 => {
                let id = node_id(arr, 1)?;
                let key = arg(arr, 2)?.as_str().ok_or(ErrorCode::InvalidInstructionFormat)?;
                let value = arg(arr, 3)?.clone();
                Ok(Instruction::SetProperty { id, key: Name::from(key), value })
            }
            4 => {
                let ids = arg(arr, 1)?.as_array().ok_or(ErrorCode::InvalidInstructionFormat)?;
                let ids = ids
                    .iter()
                    .map(|v| v.as_i32().ok_or(ErrorCode::InvalidInstructionFormat))
                    .collect::<Result<Vec<NodeId>, ErrorCode>>()?;
                Ok(Instruction::ActivateRoots { ids })
            }
            5 => Ok(Instruction::CommitUpdates),
            _ => Err(ErrorCode::InvalidInstructionFormat),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_every_opcode() {
        let create = Value::Array(vec![Value::Number(0.0), Value::Number(1.0), Value::String("cycle".into())]);
        assert!(matches!(Instruction::decode(&create), Ok(Instruction::CreateNode { id: 1, .. })));

        let delete = Value::Array(vec![Value::Number(1.0), Value::Number(1.0)]);
        assert!(matches!(Instruction::decode(&delete), Ok(Instruction::DeleteNode { id: 1 })));

        let append = Value::Array(vec![Value::Number(2.0), Value::Number(1.0), Value::Number(2.0)]);
        assert!(matches!(
            Instruction::decode(&append),
            Ok(Instruction::AppendChild { parent: 1, child: 2 })
        ));

        let set_prop = Value::Array(vec![
            Value::Number(3.0),
            Value::Number(1.0),
            Value::String("value".into()),
            Value::Number(0.5),
        ]);
        assert!(matches!(Instruction::decode(&set_prop), Ok(Instruction::SetProperty { id: 1, .. })));

        let activate = Value::Array(vec![Value::Number(4.0), Value::Array(vec![Value::Number(1.0)])]);
        assert!(matches!(Instruction::decode(&activate), Ok(Instruction::ActivateRoots { .. })));

        let commit = Value::Array(vec![Value::Number(5.0)]);
        assert!(matches!(Instruction::decode(&commit), Ok(Instruction::CommitUpdates)));
    }

    #[test]
    fn malformed_shapes_report_invalid_format() {
        assert_eq!(
            Instruction::decode(&Value::Number(0.0)).unwrap_err(),
            ErrorCode::InvalidInstructionFormat
        );
        assert_eq!(
            Instruction::decode(&Value::Array(vec![Value::Number(0.0)])).unwrap_err(),
            ErrorCode::InvalidInstructionFormat
        );
        assert_eq!(
            Instruction::decode(&Value::Array(vec![Value::Number(99.0)])).unwrap_err(),
            ErrorCode::InvalidInstructionFormat
        );
    }
}
