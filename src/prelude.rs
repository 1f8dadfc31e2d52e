//! Prelude for commonly used types and traits in tablestat.

pub use crate::engine::{
    AsyncProfileEngine, BigQueryProfileEngine, FallbackProfileEngine,
    InformationSchemaProfileEngine, ObserverProfileEngine, ParallelProfileEngine, ProfileEngine,
    ProfileTicket, RowCountProfileEngine, SnowflakeProfileEngine, SqlProfileEngine,
};
pub use crate::error::{ProfileError, Result};
pub use crate::model::{
    BatchSpec, CustomStatistic, DataSource, DataSourceKind, Expensiveness,
    ProfileNonFunctionalRequirements, ProfileRequest, ProfileResponse, StatValue, StatisticResult,
    StatisticSpec, StatisticType, TypedStatistic, UnsuccessfulKind,
};
pub use crate::report::ProfileReport;
