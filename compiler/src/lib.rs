// fillnode — generic Fill List node for typed dataflow graphs
//
// Library root. The node pads a list to a minimum length with a fill element;
// its base type is inferred from the graph and its ports follow that type.
//
//   registry  base types, conversions and copy strategies
//   graph     nodes, ports and links
//   ports     the Fill List port set and link-preserving regeneration
//   resolve   type inference from neighboring ports
//   node      Fill List state and the edit hook
//   codegen   statement emission
//   eval      reference interpreter for emitted statements
//   document  JSON graph documents

pub mod codegen;
pub mod diag;
pub mod document;
pub mod eval;
pub mod graph;
pub mod id;
pub mod node;
pub mod ports;
pub mod registry;
pub mod resolve;
