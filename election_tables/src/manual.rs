/*!

This is the long-form manual for `election_tables` and `auselect`.

## Input files

The following providers are supported:
* `aec` CSV downloads of the Australian Electoral Commission
* `csv` plain CSV files with a header row
* `xlsx` Excel workbooks

### `aec`

The AEC result files start with a one-line title before the header:

```text
2016 Federal Election House of Representatives Two Party Preferred By Polling Place - 20499
StateAb,DivisionID,DivisionNm,PollingPlaceID,PollingPlace,Liberal/National Coalition Votes,...
NSW,101,Banks,1234,Allawah,552,49.33,567,50.67,1119,-2.11
```

The title line is skipped. Set `skipRows` to change the number of lines to skip.
The files used by the analysis are:

- `twoPartyPreferred`: `HouseTppByPollingPlaceDownload` (by booth) or
  `HouseTppByDivisionDownload` (by division)
- `twoCandidatePreferred`: `HouseTcpByCandidateByPollingPlaceDownload` (by booth)
  or `HouseTcpByCandidateByVoteTypeDownload` (by division)
- `firstPreferences`: `HouseFirstPrefsByCandidateByVoteTypeDownload` (by division)
- `pollingPlaces`: `GeneralPollingPlacesDownload` (by booth)

### `csv`

Census tables by division, one row per division:

```text
DivisionNm,State,Population,MedianIncome,Bachelor,Owned,OwnershipNotStated,Age00_04,...
Adelaide,SA,160000,720,21.2,29.1,3.2,5.9,...
```

### `xlsx`

The same layout as `csv`, read from the first worksheet or from the worksheet
named by `excelWorksheetName`.

## Configuration

`auselect` works with sensible defaults from the command line:

```bash
auselect --input HouseTppByPollingPlaceDownload-20499.csv --census abs2016.csv --year 2016
```

More control is available with a JSON configuration file:

```json
{
  "outputSettings": {
    "analysisName": "Federal election 2016",
    "outputDirectory": "output",
    "year": 2016,
    "printTables": true
  },
  "sources": {
    "twoPartyPreferred": {
      "provider": "aec",
      "filePath": "HouseTppByPollingPlaceDownload-20499.csv",
      "url": "https://results.aec.gov.au/20499/Website/Downloads/HouseTppByPollingPlaceDownload-20499.csv"
    },
    "census": { "provider": "csv", "filePath": "abs2016.csv" }
  },
  "analysis": {
    "joinKind": "left",
    "partyGroups": { "LP": "LNP", "NP": "LNP", "LNP": "LNP", "CLP": "LNP" },
    "regression": { "significanceLevel": 0.05 }
  }
}
```

Paths are relative to the configuration file. A source with a `url` is
downloaded when its file does not exist yet.

Options of a source:
 - `provider` (`aec`, `csv` or `xlsx`)
 - `filePath`
 - `url` (optional)
 - `skipRows` (optional): lines before the header row.
 - `excelWorksheetName` (optional)
 - `divisionColumn` (optional): the name of the division column in this file. It is
   renamed to `DivisionNm` when the file is loaded.

Options of the analysis:
 - `joinKind` (`left` or `inner`, default `left`): how the census is joined to the results.
 - `firstParty`, `secondParty` (optional): the labels and the columns of the
   two-party-preferred parties. They default to the coalition (`LNP`) and Labor (`ALP`).
 - `totalColumn` (default `TotalVotes`): the total of the two-party-preferred votes.
 - `divisionColumn` (optional): the division column of every source that does not set its own.
 - `partyGroups` (optional): recodes party abbreviations before counting votes and seats.
 - `informalLabel` (default `Informal`): first preference rows with this surname are not votes.
 - `tolerance` (default `0.1`): the rounding tolerance of the percentage checks.
 - `regression`: `response` (default: the percentage of the first party),
   `excludeSuffixes` (default `["NotStated"]`), `excludePrefixes` (default `["Age"]`),
   `excludeColumns`, `significanceLevel` (default `0.05`).

## Output

The summary of the analysis is printed in JSON, or written to the path given with `--out`.
When `outputDirectory` is set, the derived tables are also written there in CSV:
`division_tpp.csv`, `booth_points.csv`, `division_tcp.csv`, `party_votes.csv`,
`party_votes_by_state.csv`, `seats.csv`, `census_joined.csv`, `regression.csv`.

Ties between parties are never resolved: a tied division has no winner and is
counted under `tied`.

The two-candidate-preferred votes are summed per `CandidateID` when the file has
that column (both AEC forms do), and per `PartyAb` otherwise. A candidate
without a party is counted as `IND`. The vote column is `TotalVotes` in the
division form and `OrdinaryVotes` in the booth form.

 */
