use std::fmt;

use crate::error::RelayError;

/// Branch whose jobs are named after the project alone.
pub const DEFAULT_BRANCH: &str = "master";

/// Identity of a Jenkins job derived from a repository url and a git ref.
///
/// The textual form is `group-project`, or `group-project-branch` for any
/// branch other than `master`. Jenkins keys jobs by this text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobIdentity {
    pub group: String,
    pub project: String,
    pub branch: String,
}

impl JobIdentity {
    /// Resolve the identity from an SSH url (`git@host:group/project.git`)
    /// and a ref (`refs/heads/<branch>`).
    ///
    /// Only the first two path segments after the `:` are used, and the
    /// project name is cut at its first `.`. The branch is the last
    /// `/`-delimited component of the ref.
    pub fn resolve(repository_url: &str, git_ref: &str) -> Result<Self, RelayError> {
        let path = repository_url.split(':').nth(1).ok_or_else(|| {
            RelayError::InvalidPayload(format!(
                "repository url '{}' is not in git@host:group/project form",
                repository_url
            ))
        })?;

        let mut segments = path.split('/');
        let group = segments.next().filter(|g| !g.is_empty());
        let project = segments
            .next()
            .and_then(|p| p.split('.').next())
            .filter(|p| !p.is_empty());

        let (group, project) = match (group, project) {
            (Some(group), Some(project)) => (group, project),
            _ => {
                return Err(RelayError::InvalidPayload(format!(
                    "cannot extract group and project from '{}'",
                    repository_url
                )));
            }
        };

        let branch = git_ref.rsplit('/').next().unwrap_or_default();

        Ok(Self {
            group: group.to_string(),
            project: project.to_string(),
            branch: branch.to_string(),
        })
    }

    /// Job name as Jenkins stores it.
    pub fn job_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.group, self.project)?;
        if !self.branch.is_empty() && self.branch != DEFAULT_BRANCH {
            write!(f, "-{}", self.branch)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("git@host:teamA/svc.git", "refs/heads/feature-x", "teamA-svc-feature-x")]
    #[case("git@host:teamA/svc.git", "refs/heads/master", "teamA-svc")]
    #[case("git@host:teamA/svc.git", "", "teamA-svc")]
    #[case("git@host:teamA/svc.git", "refs/heads/", "teamA-svc")]
    #[case("git@host:teamA/svc.git", "refs/heads/main", "teamA-svc-main")]
    #[case("git@host:teamA/svc.git", "refs/heads/feature/login", "teamA-svc-login")]
    #[case("git@host:teamA/svc.v2.git", "refs/heads/dev", "teamA-svc-dev")]
    #[case("git@host:teamA/svc", "refs/heads/dev", "teamA-svc-dev")]
    fn resolves_job_names(#[case] url: &str, #[case] git_ref: &str, #[case] expected: &str) {
        let identity = JobIdentity::resolve(url, git_ref).unwrap();
        assert_eq!(identity.job_name(), expected);
    }

    #[test]
    fn resolve_is_deterministic() {
        let first = JobIdentity::resolve("git@host:g/p.git", "refs/heads/b").unwrap();
        let _other = JobIdentity::resolve("git@host:x/y.git", "refs/heads/z").unwrap();
        let second = JobIdentity::resolve("git@host:g/p.git", "refs/heads/b").unwrap();

        assert_eq!(first, second);
        assert_eq!(first.job_name(), second.job_name());
    }

    #[test]
    fn keeps_parts_separately() {
        let identity =
            JobIdentity::resolve("git@host:teamA/svc.git", "refs/heads/feature-x").unwrap();
        assert_eq!(identity.group, "teamA");
        assert_eq!(identity.project, "svc");
        assert_eq!(identity.branch, "feature-x");
    }

    #[rstest]
    #[case("https-without-colon")]
    #[case("git@host:onlygroup")]
    #[case("git@host:/svc.git")]
    #[case("git@host:teamA/.git")]
    fn rejects_urls_without_group_and_project(#[case] url: &str) {
        let err = JobIdentity::resolve(url, "refs/heads/master").unwrap_err();
        assert!(matches!(err, RelayError::InvalidPayload(_)));
    }
}
