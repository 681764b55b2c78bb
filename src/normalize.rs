use crate::github::ApiRepository;
use crate::models::RawRecord;

/// Flatten an API repository into the nine-field raw record.
/// Counts default to 0, the license collapses to its name.
pub fn simplify_repo(repo: ApiRepository) -> RawRecord {
    let license = repo.license.and_then(|l| l.name);

    RawRecord::new()
        .with("name", repo.name)
        .with("full_name", repo.full_name)
        .with("stars", repo.stargazers_count.unwrap_or(0))
        .with("forks", repo.forks_count.unwrap_or(0))
        .with("license", license)
        .with("language", repo.language)
        .with("created_at", repo.created_at)
        .with("updated_at", repo.updated_at)
        .with("pushed_at", repo.pushed_at)
}
