/*!
Tables of Australian federal election results and census data, and the few
operations needed to analyse them together.

The data comes from the Australian Electoral Commission (results by polling
place and by division) and from the Australian Bureau of Statistics (census
attributes by division). Every file is loaded into a [`Table`], and the
analysis is a chain of functional steps, each returning a new table:

* [`join`] two tables on shared keys (left or inner join);
* derive the winner and the margin of every division
  ([`two_party_by_division`], [`candidate_outcome`]);
* aggregate by division, state or party ([`group_by`], [`count_where`]);
* fit a linear model of the vote on the census attributes ([`ols`]).

```
use election_tables::*;

let booths = Table::from_strings(
    &["DivisionNm", "PollingPlaceID", "PartyAb", "OrdinaryVotes"],
    &[
        vec!["Banks", "1", "ALP", "21000"],
        vec!["Banks", "1", "LP", "21010"],
        vec!["Banks", "2", "ALP", "21534"],
        vec!["Banks", "2", "LP", "21456"],
    ],
)?;
let outcome = candidate_outcome(&booths, &["DivisionNm"], None, "PartyAb", "OrdinaryVotes")?;
assert_eq!(outcome.value(0, WINNER)?.as_str(), Some("ALP"));
assert_eq!(outcome.value(0, MARGIN_VOTES)?, &Value::Number(68.0));
# Ok::<(), TableErrors>(())
```

See the [manual] for the file formats and the command line program.
*/
mod aggregate;
pub mod checks;
mod config;
mod derive;
mod join;
pub mod manual;
mod regression;
mod table;

pub use crate::aggregate::*;
pub use crate::config::*;
pub use crate::derive::*;
pub use crate::join::*;
pub use crate::regression::*;
pub use crate::table::{RowView, Table};
