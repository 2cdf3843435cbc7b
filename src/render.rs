//! Substitution of push data into job templates

use tracing::error;

use crate::clients::SourceHost;
use crate::error::Result;
use crate::job::JobIdentity;
use crate::webhook::PushEvent;

pub const USER_EMAIL: &str = "USER_EMAIL";
pub const GIT_REPOSITORY: &str = "GIT_REPOSITORY";
pub const GIT_BRANCH: &str = "GIT_BRANCH";
pub const GIT_URL: &str = "GIT_URL";
pub const PROJECT_NAME: &str = "PROJECT_NAME";

/// Token names recognised in templates. No token is a substring of another.
pub const TOKENS: [&str; 5] = [USER_EMAIL, GIT_REPOSITORY, GIT_BRANCH, GIT_URL, PROJECT_NAME];

/// Values substituted for each token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variables {
    pub user_email: String,
    pub git_repository: String,
    pub git_branch: String,
    pub git_url: String,
    pub project_name: String,
}

impl Variables {
    fn value_of<'a>(&'a self, token: &'a str) -> &'a str {
        match token {
            USER_EMAIL => &self.user_email,
            GIT_REPOSITORY => &self.git_repository,
            GIT_BRANCH => &self.git_branch,
            GIT_URL => &self.git_url,
            PROJECT_NAME => &self.project_name,
            _ => token,
        }
    }
}

/// Job name plus the template with every token replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedJob {
    pub job_name: String,
    pub config: String,
}

/// Turn `git@host:group/project.git` into `http://host/group/project.git`.
/// Urls that are not in SSH form are returned unchanged.
pub fn http_repository_url(ssh_url: &str) -> String {
    match ssh_url.strip_prefix("git@") {
        Some(rest) => format!("http://{}", rest.replacen(':', "/", 1)),
        None => ssh_url.to_string(),
    }
}

/// Replace every occurrence of every token in one left-to-right pass.
///
/// Substituted values are never rescanned, so a value containing a token
/// name is emitted as is. Unknown placeholders are left untouched.
pub fn substitute(template: &str, vars: &Variables) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    loop {
        let next = TOKENS
            .iter()
            .filter_map(|token| rest.find(token).map(|pos| (pos, *token)))
            .min_by_key(|(pos, _)| *pos);
        match next {
            Some((pos, token)) => {
                out.push_str(&rest[..pos]);
                out.push_str(vars.value_of(token));
                rest = &rest[pos + token.len()..];
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

/// Build the variable set for a push, looking up the pusher's email.
pub async fn variables_for(host: &dyn SourceHost, event: &PushEvent) -> Result<Variables> {
    let identity = JobIdentity::resolve(&event.repository.url, &event.git_ref)?;
    let user_email = host.user_email(event.user_id).await.map_err(|e| {
        error!("Could not look up email of user {}: {}", event.user_id, e);
        e
    })?;

    Ok(Variables {
        user_email,
        git_repository: http_repository_url(&event.repository.url),
        git_branch: event.branch().to_string(),
        git_url: event.repository.homepage.clone(),
        project_name: identity.job_name(),
    })
}

/// Render a template for a push event.
pub async fn render_job(
    host: &dyn SourceHost,
    event: &PushEvent,
    template: &str,
) -> Result<RenderedJob> {
    let vars = variables_for(host, event).await?;
    Ok(RenderedJob {
        config: substitute(template, &vars),
        job_name: vars.project_name,
    })
}
