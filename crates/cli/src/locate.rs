use jarweave_api::{ArtifactCoordinate, Version};
use jarweave_core::{LocalRepository, Repository};

pub fn run(
    group: &str,
    artifact: &str,
    version: &str,
    extension: &str,
    repository: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let coordinate = ArtifactCoordinate::new(group, artifact, Version::parse(version)?);
    let remote = match repository {
        Some(url) => Repository::new("custom", url)?,
        None => Repository::maven_central()?,
    };

    println!("{}", LocalRepository::default().locate(&coordinate, extension).display());
    println!("{}", remote.locate(&coordinate, extension)?);
    Ok(())
}
