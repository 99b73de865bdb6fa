//! Write scraped titles to a media library.
//!
//! Rules:
//! 1. Every written field is locked so later library refreshes keep it.
//! 2. Episode titles and summaries go through the reconciler, so a generic
//!    scraped title never overwrites a real one already in the library.
//! 3. A season or episode missing from the library is skipped with a
//!    warning; a show or movie that cannot be found is an error.

use std::collections::{HashMap, HashSet};

use plexmeta_core::ItemKind;
use plexmeta_text::reconcile::season_title;
use plexmeta_text::{ReconcileSettings, Reconciler};
use tracing::{debug, info, warn};

use crate::library::{Field, FieldEdit, LibraryEntry, MediaLibrary};
use crate::{MetadataError, Title};

#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Search the library under this title instead of the scraped name.
    pub library_title: Option<String>,
    /// Also upload posters and background art.
    pub replace_poster: bool,
    pub reconcile: ReconcileSettings,
}

/// Resolves library lookups that need outside help.
#[async_trait::async_trait]
pub trait TitleResolver: Send + Sync {
    /// Alternative names to search with when the scraped name finds nothing.
    async fn aliases(&self, _name: &str, _year: Option<i32>, _is_movie: bool) -> Vec<String> {
        Vec::new()
    }

    /// Ask for a title to search with after every lookup failed.
    async fn prompt_title(&self, name: &str) -> Option<String>;

    /// Choose among several matches; returns an index into `candidates`.
    async fn pick(&self, query: &str, candidates: &[LibraryEntry]) -> Option<usize>;
}

/// What was written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub shows: usize,
    pub movies: usize,
    pub seasons: usize,
    pub episodes: usize,
    pub skipped_episodes: usize,
}

pub async fn apply_titles(
    library: &dyn MediaLibrary,
    titles: &[&Title],
    options: &ApplyOptions,
    resolver: &dyn TitleResolver,
) -> Result<ApplyReport, MetadataError> {
    let reconciler = Reconciler::new(options.reconcile.clone());
    let mut report = ApplyReport::default();
    let mut shows: HashMap<String, LibraryEntry> = HashMap::new();
    let mut seasons_done: HashSet<(String, u32)> = HashSet::new();

    for title in titles {
        if title.is_movie() {
            let movie = find_entry(library, resolver, options, ItemKind::Movie, title).await?;
            apply_top_level(library, &reconciler, &movie, ItemKind::Movie, title, options).await?;
            report.movies += 1;
            continue;
        }

        let Some(record) = title.episode_record() else {
            warn!(id = %title.id, name = %title.name, "episode without season/episode number, skipping");
            report.skipped_episodes += 1;
            continue;
        };

        let show = match shows.get(&title.name) {
            Some(show) => show.clone(),
            None => {
                let show = find_entry(library, resolver, options, ItemKind::Show, title).await?;
                apply_top_level(library, &reconciler, &show, ItemKind::Show, title, options).await?;
                report.shows += 1;
                shows.insert(title.name.clone(), show.clone());
                show
            }
        };

        if seasons_done.insert((show.rating_key.clone(), record.season))
            && apply_season(library, &reconciler, &show, record.season, title, options).await?
        {
            report.seasons += 1;
        }

        let Some(entry) = library.episode(&show, record.season, record.episode).await? else {
            warn!(
                show = %show.title,
                season = record.season,
                episode = record.episode,
                "episode not in library, skipping"
            );
            report.skipped_episodes += 1;
            continue;
        };

        let decision = reconciler.decide(&record, &entry.title, &entry.summary);
        let mut edits = vec![FieldEdit::new(Field::Title, decision.final_title.clone())];
        if !decision.final_synopsis.is_empty() {
            edits.push(FieldEdit::new(Field::Summary, decision.final_synopsis));
        }
        library.edit(&entry, ItemKind::Episode, &edits).await?;
        info!(
            show = %show.title,
            season = record.season,
            episode = record.episode,
            title = %decision.final_title,
            "episode updated"
        );

        if options.replace_poster {
            if let Some(poster) = &title.episode_poster {
                library.upload_poster(&entry, poster).await?;
            }
        }
        report.episodes += 1;
    }

    Ok(report)
}

async fn find_entry(
    library: &dyn MediaLibrary,
    resolver: &dyn TitleResolver,
    options: &ApplyOptions,
    kind: ItemKind,
    title: &Title,
) -> Result<LibraryEntry, MetadataError> {
    let query = options.library_title.as_deref().unwrap_or(&title.name);
    let mut candidates = library.search(kind, query).await?;

    if candidates.is_empty() && options.library_title.is_none() {
        for alias in resolver.aliases(&title.name, title.year, title.is_movie()).await {
            candidates = library.search(kind, &alias).await?;
            if !candidates.is_empty() {
                debug!(name = %title.name, alias = %alias, "found {kind} by alias");
                break;
            }
        }
    }

    if candidates.is_empty() && options.library_title.is_none() {
        if let Some(typed) = resolver.prompt_title(&title.name).await {
            candidates = library.search(kind, typed.trim()).await?;
        }
    }

    match candidates.len() {
        0 => Err(MetadataError::NotFound(format!(
            "{kind} `{query}` is not in the library"
        ))),
        1 => Ok(candidates.swap_remove(0)),
        n => {
            let index = resolver
                .pick(query, &candidates)
                .await
                .filter(|&i| i < n)
                .ok_or_else(|| MetadataError::NotFound(format!("no {kind} chosen for `{query}`")))?;
            Ok(candidates.swap_remove(index))
        }
    }
}

/// Summary, content rating and art of a show or movie.
async fn apply_top_level(
    library: &dyn MediaLibrary,
    reconciler: &Reconciler,
    entry: &LibraryEntry,
    kind: ItemKind,
    title: &Title,
    options: &ApplyOptions,
) -> Result<(), MetadataError> {
    let mut edits = Vec::new();
    let summary = reconciler.synopsis(title.synopsis.as_deref().unwrap_or_default(), &entry.summary);
    if !summary.is_empty() {
        edits.push(FieldEdit::new(Field::Summary, summary));
    }
    if let Some(rating) = &title.content_rating {
        edits.push(FieldEdit::new(Field::ContentRating, rating.clone()));
    }
    library.edit(entry, kind, &edits).await?;
    info!(kind = %kind, title = %entry.title, fields = edits.len(), "updated");

    if options.replace_poster {
        if let Some(poster) = &title.poster {
            library.upload_poster(entry, poster).await?;
        }
        if let Some(background) = &title.background {
            library.upload_art(entry, background).await?;
        }
    }
    Ok(())
}

/// Returns whether the season exists in the library.
async fn apply_season(
    library: &dyn MediaLibrary,
    reconciler: &Reconciler,
    show: &LibraryEntry,
    season: u32,
    title: &Title,
    options: &ApplyOptions,
) -> Result<bool, MetadataError> {
    let Some(entry) = library.season(show, season).await? else {
        warn!(show = %show.title, season, "season not in library, skipping");
        return Ok(false);
    };

    let name = title.season_name.clone().unwrap_or_else(|| season_title(season));
    let mut edits = vec![FieldEdit::new(Field::Title, name)];
    let summary = reconciler.synopsis(
        title.season_synopsis.as_deref().unwrap_or_default(),
        &entry.summary,
    );
    if !summary.is_empty() {
        edits.push(FieldEdit::new(Field::Summary, summary));
    }
    library.edit(&entry, ItemKind::Season, &edits).await?;

    if options.replace_poster {
        if let Some(background) = &title.background {
            library.upload_art(&entry, background).await?;
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::Source;

    #[derive(Default)]
    struct FakeLibrary {
        shows: Vec<LibraryEntry>,
        movies: Vec<LibraryEntry>,
        seasons: HashMap<(String, u32), LibraryEntry>,
        episodes: HashMap<(String, u32, u32), LibraryEntry>,
        searches: Mutex<Vec<String>>,
        edits: Mutex<Vec<(String, ItemKind, Vec<FieldEdit>)>>,
        uploads: Mutex<Vec<(String, String)>>,
    }

    impl FakeLibrary {
        fn edits_for(&self, key: &str) -> Vec<FieldEdit> {
            self.edits
                .lock()
                .unwrap()
                .iter()
                .filter(|(k, _, _)| k == key)
                .flat_map(|(_, _, e)| e.clone())
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl MediaLibrary for FakeLibrary {
        async fn search(&self, kind: ItemKind, title: &str) -> Result<Vec<LibraryEntry>, MetadataError> {
            self.searches.lock().unwrap().push(title.to_string());
            let pool = if kind == ItemKind::Movie { &self.movies } else { &self.shows };
            Ok(pool.iter().filter(|e| e.title == title).cloned().collect())
        }

        async fn season(&self, show: &LibraryEntry, season: u32) -> Result<Option<LibraryEntry>, MetadataError> {
            Ok(self.seasons.get(&(show.rating_key.clone(), season)).cloned())
        }

        async fn episode(
            &self,
            show: &LibraryEntry,
            season: u32,
            episode: u32,
        ) -> Result<Option<LibraryEntry>, MetadataError> {
            Ok(self
                .episodes
                .get(&(show.rating_key.clone(), season, episode))
                .cloned())
        }

        async fn edit(&self, entry: &LibraryEntry, kind: ItemKind, edits: &[FieldEdit]) -> Result<(), MetadataError> {
            self.edits
                .lock()
                .unwrap()
                .push((entry.rating_key.clone(), kind, edits.to_vec()));
            Ok(())
        }

        async fn upload_poster(&self, entry: &LibraryEntry, url: &str) -> Result<(), MetadataError> {
            self.uploads
                .lock()
                .unwrap()
                .push((entry.rating_key.clone(), format!("poster:{url}")));
            Ok(())
        }

        async fn upload_art(&self, entry: &LibraryEntry, url: &str) -> Result<(), MetadataError> {
            self.uploads
                .lock()
                .unwrap()
                .push((entry.rating_key.clone(), format!("art:{url}")));
            Ok(())
        }
    }

    #[derive(Default)]
    struct Scripted {
        aliases: Vec<String>,
        typed: Option<String>,
        pick: Option<usize>,
    }

    #[async_trait::async_trait]
    impl TitleResolver for Scripted {
        async fn aliases(&self, _name: &str, _year: Option<i32>, _is_movie: bool) -> Vec<String> {
            self.aliases.clone()
        }

        async fn prompt_title(&self, _name: &str) -> Option<String> {
            self.typed.clone()
        }

        async fn pick(&self, _query: &str, _candidates: &[LibraryEntry]) -> Option<usize> {
            self.pick
        }
    }

    fn entry(key: &str, title: &str, summary: &str) -> LibraryEntry {
        LibraryEntry {
            rating_key: key.into(),
            section_id: Some("1".into()),
            title: title.into(),
            summary: summary.into(),
            ..Default::default()
        }
    }

    fn library() -> FakeLibrary {
        let mut lib = FakeLibrary {
            shows: vec![entry("show", "魔法少女", "")],
            ..Default::default()
        };
        lib.seasons
            .insert(("show".into(), 1), entry("s1", "Season 1", "舊的季介紹。"));
        lib.episodes
            .insert(("show".into(), 1, 7), entry("e7", "魔法覺醒", "舊的劇情。"));
        lib.episodes
            .insert(("show".into(), 1, 8), entry("e8", "Episode 8", ""));
        lib
    }

    fn episode(n: u32, name: &str, synopsis: &str) -> Title {
        Title::episode(Source::Kktv, format!("e{n}"), "魔法少女", 1, n)
            .with_synopsis("魔法少女的故事。")
            .with_episode_name(name)
            .with_episode_synopsis(synopsis)
            .with_episode_poster(Some(format!("https://img/e{n}.jpg")))
    }

    #[tokio::test]
    async fn episodes_are_reconciled_and_locked() {
        let lib = library();
        let titles = [episode(7, "第 7 集", "新的劇情。"), episode(8, "", "")];
        let refs: Vec<&Title> = titles.iter().collect();

        let report = apply_titles(&lib, &refs, &ApplyOptions::default(), &Scripted::default())
            .await
            .unwrap();
        assert_eq!(
            report,
            ApplyReport {
                shows: 1,
                seasons: 1,
                episodes: 2,
                ..Default::default()
            }
        );

        assert_eq!(
            lib.edits_for("e7"),
            [
                FieldEdit::new(Field::Title, "魔法覺醒"),
                FieldEdit::new(Field::Summary, "新的劇情。"),
            ]
        );
        assert_eq!(lib.edits_for("e8"), [FieldEdit::new(Field::Title, "第 8 集")]);
        assert_eq!(
            lib.edits_for("s1"),
            [
                FieldEdit::new(Field::Title, "第 1 季"),
                FieldEdit::new(Field::Summary, "舊的季介紹。"),
            ]
        );
        assert_eq!(
            lib.edits_for("show"),
            [FieldEdit::new(Field::Summary, "魔法少女的故事。")]
        );
        // The show is looked up once for both episodes.
        assert_eq!(lib.searches.lock().unwrap().len(), 1);
        assert!(lib.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_episode_is_skipped() {
        let lib = library();
        let titles = [episode(9, "大結局", "")];
        let refs: Vec<&Title> = titles.iter().collect();

        let report = apply_titles(&lib, &refs, &ApplyOptions::default(), &Scripted::default())
            .await
            .unwrap();
        assert_eq!(report.episodes, 0);
        assert_eq!(report.skipped_episodes, 1);
    }

    #[tokio::test]
    async fn posters_uploaded_when_requested() {
        let lib = library();
        let titles = [episode(7, "魔法覺醒", "")];
        let refs: Vec<&Title> = titles.iter().collect();
        let options = ApplyOptions {
            replace_poster: true,
            ..Default::default()
        };

        apply_titles(&lib, &refs, &options, &Scripted::default())
            .await
            .unwrap();
        assert_eq!(
            *lib.uploads.lock().unwrap(),
            [("e7".to_string(), "poster:https://img/e7.jpg".to_string())]
        );
    }

    #[tokio::test]
    async fn show_found_through_alias_then_prompt() {
        let mut lib = library();
        lib.shows = vec![entry("show", "Magical Girl", "")];
        let titles = [episode(7, "魔法覺醒", "")];
        let refs: Vec<&Title> = titles.iter().collect();

        let resolver = Scripted {
            aliases: vec!["Mahou Shoujo".into(), "Magical Girl".into()],
            ..Default::default()
        };
        let report = apply_titles(&lib, &refs, &ApplyOptions::default(), &resolver)
            .await
            .unwrap();
        assert_eq!(report.episodes, 1);

        let resolver = Scripted {
            typed: Some(" Magical Girl ".into()),
            ..Default::default()
        };
        let report = apply_titles(&lib, &refs, &ApplyOptions::default(), &resolver)
            .await
            .unwrap();
        assert_eq!(report.shows, 1);
    }

    #[tokio::test]
    async fn unknown_show_is_an_error() {
        let lib = FakeLibrary::default();
        let titles = [episode(1, "", "")];
        let refs: Vec<&Title> = titles.iter().collect();

        let err = apply_titles(&lib, &refs, &ApplyOptions::default(), &Scripted::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::NotFound(_)));
    }

    #[tokio::test]
    async fn several_matches_use_the_pick() {
        let mut lib = library();
        lib.movies = vec![entry("m1", "可可夜總會", ""), entry("m2", "可可夜總會", "")];
        let movie = Title::movie(Source::DisneyPlus, "coco", "可可夜總會")
            .with_synopsis("米高夢想成為音樂家。")
            .with_content_rating(Some("PG"))
            .with_poster(Some("https://img/poster".into()));
        let refs = [&movie];
        let options = ApplyOptions {
            replace_poster: true,
            ..Default::default()
        };

        let resolver = Scripted {
            pick: Some(1),
            ..Default::default()
        };
        let report = apply_titles(&lib, &refs, &options, &resolver).await.unwrap();
        assert_eq!(report.movies, 1);
        assert_eq!(
            lib.edits_for("m2"),
            [
                FieldEdit::new(Field::Summary, "米高夢想成為音樂家。"),
                FieldEdit::new(Field::ContentRating, "PG"),
            ]
        );
        assert_eq!(lib.uploads.lock().unwrap()[0].1, "poster:https://img/poster");

        let resolver = Scripted {
            pick: Some(5),
            ..Default::default()
        };
        assert!(apply_titles(&lib, &refs, &options, &resolver).await.is_err());
    }

    #[tokio::test]
    async fn library_title_override_skips_prompt() {
        let lib = library();
        let titles = [episode(7, "魔法覺醒", "")];
        let refs: Vec<&Title> = titles.iter().collect();
        let options = ApplyOptions {
            library_title: Some("Nope".into()),
            ..Default::default()
        };
        let resolver = Scripted {
            typed: Some("魔法少女".into()),
            ..Default::default()
        };

        assert!(apply_titles(&lib, &refs, &options, &resolver).await.is_err());
        assert_eq!(*lib.searches.lock().unwrap(), ["Nope"]);
    }
}
