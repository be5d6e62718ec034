//! GraphQL documents issued by the builtin units.

/// Resolve an account, whichever kind it is.
pub const ACCOUNT: &str = r#"
query Account($login: String!) {
  account: repositoryOwner(login: $login) {
    __typename
    login
    avatarUrl
    ... on User {
      name
      createdAt
      followers {
        totalCount
      }
    }
    ... on Organization {
      name
      createdAt
    }
  }
}
"#;

/// Contribution calendar between two instants (at most one year apart).
pub const CALENDAR: &str = r#"
query Calendar($login: String!, $from: DateTime!, $to: DateTime!) {
  user(login: $login) {
    calendar: contributionsCollection(from: $from, to: $to) {
      contributionCalendar {
        weeks {
          contributionDays {
            contributionCount
            color
            date
          }
        }
      }
    }
  }
}
"#;
