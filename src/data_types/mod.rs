
/// Chromosome classification and the composite locus key
pub mod locus;
/// Mutation file rows and id assignment
pub mod mutation;
/// Per-sample rows consumed by the mutation-file formatter
pub mod observation;
/// Parameters (samples / clusters / garbage) that accompany a mutation file
pub mod parameters;
/// Normalized source rows and the aggregated table
pub mod records;
/// Generic in-memory table with typed cells, the format all sources are loaded into
pub mod table;
