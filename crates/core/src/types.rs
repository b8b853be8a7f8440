/// Node identifiers are the string keys of the execution graph.
///
/// Display graphs store numeric ids; they are compared by their decimal
/// string form.
pub type NodeId = String;
