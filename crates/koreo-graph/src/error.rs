use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlattenError {
  #[error("workflow graph nested deeper than {limit} levels at node '{node_id}'")]
  NestingTooDeep { node_id: String, limit: usize },
}
