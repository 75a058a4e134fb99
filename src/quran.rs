use std::{path::PathBuf, time::Duration};

use rand::seq::SliceRandom as _;

use crate::{
    encode::probe_duration,
    error::{TilawahError, TilawahResult},
    sequencer::{UnitData, UnitSource},
    timing::{WordTexts, WordTiming, sort_by_start},
};

pub const AUDIO_CDN_BASE: &str = "https://audio.qurancdn.com/";

/// Verses per surah, indexed by surah number - 1.
#[rustfmt::skip]
pub const VERSE_COUNTS: [u16; 114] = [
      7, 286, 200, 176, 120, 165, 206,  75, 129, 109,
    123, 111,  43,  52,  99, 128, 111, 110,  98, 135,
    112,  78, 118,  64,  77, 227,  93,  88,  69,  60,
     34,  30,  73,  54,  45,  83, 182,  88,  75,  85,
     54,  53,  89,  59,  37,  35,  38,  29,  18,  45,
     60,  49,  62,  55,  78,  96,  29,  22,  24,  13,
     14,  11,  11,  18,  12,  12,  30,  52,  52,  44,
     28,  28,  20,  56,  40,  31,  50,  40,  46,  42,
     29,  19,  36,  25,  22,  17,  19,  26,  30,  20,
     15,  21,  11,   8,   8,  19,   5,   8,   8,  11,
     11,   8,   3,   9,   5,   4,   7,   3,   6,   3,
      5,   4,   5,   6,
];

#[rustfmt::skip]
pub const SURAH_NAMES_AR: [&str; 114] = [
    "الفاتحة", "البقرة", "آل عمران", "النساء", "المائدة", "الأنعام", "الأعراف", "الأنفال", "التوبة", "يونس",
    "هود", "يوسف", "الرعد", "إبراهيم", "الحجر", "النحل", "الإسراء", "الكهف", "مريم", "طه",
    "الأنبياء", "الحج", "المؤمنون", "النور", "الفرقان", "الشعراء", "النمل", "القصص", "العنكبوت", "الروم",
    "لقمان", "السجدة", "الأحزاب", "سبأ", "فاطر", "يس", "الصافات", "ص", "الزمر", "غافر",
    "فصلت", "الشورى", "الزخرف", "الدخان", "الجاثية", "الأحقاف", "محمد", "الفتح", "الحجرات", "ق",
    "الذاريات", "الطور", "النجم", "القمر", "الرحمن", "الواقعة", "الحديد", "المجادلة", "الحشر", "الممتحنة",
    "الصف", "الجمعة", "المنافقون", "التغابن", "الطلاق", "التحريم", "الملك", "القلم", "الحاقة", "المعارج",
    "نوح", "الجن", "المزمل", "المدثر", "القيامة", "الإنسان", "المرسلات", "النبأ", "النازعات", "عبس",
    "التكوير", "الانفطار", "المطففين", "الانشقاق", "البروج", "الطارق", "الأعلى", "الغاشية", "الفجر", "البلد",
    "الشمس", "الليل", "الضحى", "الشرح", "التين", "العلق", "القدر", "البينة", "الزلزلة", "العاديات",
    "القارعة", "التكاثر", "العصر", "الهمزة", "الفيل", "قريش", "الماعون", "الكوثر", "الكافرون", "النصر",
    "المسد", "الإخلاص", "الفلق", "الناس",
];

#[rustfmt::skip]
pub const SURAH_NAMES_EN: [&str; 114] = [
    "Al-Fatihah", "Al-Baqarah", "Aal-Imran", "An-Nisa", "Al-Maidah", "Al-Anam", "Al-Araf", "Al-Anfal", "At-Tawbah", "Yunus",
    "Hud", "Yusuf", "Ar-Rad", "Ibrahim", "Al-Hijr", "An-Nahl", "Al-Isra", "Al-Kahf", "Maryam", "Ta-Ha",
    "Al-Anbiya", "Al-Hajj", "Al-Muminun", "An-Nur", "Al-Furqan", "Ash-Shuara", "An-Naml", "Al-Qasas", "Al-Ankabut", "Ar-Rum",
    "Luqman", "As-Sajdah", "Al-Ahzab", "Saba", "Fatir", "Ya-Sin", "As-Saffat", "Sad", "Az-Zumar", "Ghafir",
    "Fussilat", "Ash-Shura", "Az-Zukhruf", "Ad-Dukhan", "Al-Jathiyah", "Al-Ahqaf", "Muhammad", "Al-Fath", "Al-Hujurat", "Qaf",
    "Adh-Dhariyat", "At-Tur", "An-Najm", "Al-Qamar", "Ar-Rahman", "Al-Waqiah", "Al-Hadid", "Al-Mujadilah", "Al-Hashr", "Al-Mumtahanah",
    "As-Saff", "Al-Jumuah", "Al-Munafiqun", "At-Taghabun", "At-Talaq", "At-Tahrim", "Al-Mulk", "Al-Qalam", "Al-Haqqah", "Al-Maarij",
    "Nuh", "Al-Jinn", "Al-Muzzammil", "Al-Muddaththir", "Al-Qiyamah", "Al-Insan", "Al-Mursalat", "An-Naba", "An-Naziat", "Abasa",
    "At-Takwir", "Al-Infitar", "Al-Mutaffifin", "Al-Inshiqaq", "Al-Buruj", "At-Tariq", "Al-Ala", "Al-Ghashiyah", "Al-Fajr", "Al-Balad",
    "Ash-Shams", "Al-Layl", "Ad-Duha", "Ash-Sharh", "At-Tin", "Al-Alaq", "Al-Qadr", "Al-Bayyinah", "Az-Zalzalah", "Al-Adiyat",
    "Al-Qariah", "At-Takathur", "Al-Asr", "Al-Humazah", "Al-Fil", "Quraysh", "Al-Maun", "Al-Kawthar", "Al-Kafirun", "An-Nasr",
    "Al-Masad", "Al-Ikhlas", "Al-Falaq", "An-Nas",
];

#[derive(Clone, Copy, Debug)]
pub struct Reciter {
    pub key: &'static str,
    /// Recitation id on the quran.com v4 API.
    pub v4_id: u32,
    pub name_ar: &'static str,
    pub name_en: &'static str,
}

pub const RECITERS: &[Reciter] = &[
    Reciter {
        key: "alafasy",
        v4_id: 7,
        name_ar: "الشيخ مشاري العفاسي",
        name_en: "Mishary Alafasy",
    },
    Reciter {
        key: "abdul_basit_murattal",
        v4_id: 2,
        name_ar: "الشيخ عبدالباسط عبدالصمد",
        name_en: "Abdul Basit (Murattal)",
    },
    Reciter {
        key: "sudais",
        v4_id: 3,
        name_ar: "الشيخ عبدالرحمن السديس",
        name_en: "Abdurrahman As-Sudais",
    },
    Reciter {
        key: "husary",
        v4_id: 5,
        name_ar: "الشيخ محمود خليل الحصري",
        name_en: "Mahmoud Khalil Al-Husary",
    },
    Reciter {
        key: "shuraym",
        v4_id: 6,
        name_ar: "الشيخ سعود الشريم",
        name_en: "Saud Ash-Shuraym",
    },
    Reciter {
        key: "minshawi_mujawwad",
        v4_id: 10,
        name_ar: "الشيخ محمد صديق المنشاوي",
        name_en: "Minshawi (Mujawwad)",
    },
];

pub const DEFAULT_RECITER: &str = "alafasy";

pub fn reciter_by_key(key: &str) -> Option<&'static Reciter> {
    RECITERS.iter().find(|r| r.key == key)
}

pub fn random_reciter() -> &'static Reciter {
    RECITERS
        .choose(&mut rand::thread_rng())
        .unwrap_or(&RECITERS[0])
}

pub fn verse_count(surah: u32) -> TilawahResult<u32> {
    VERSE_COUNTS
        .get(surah.wrapping_sub(1) as usize)
        .map(|&c| u32::from(c))
        .ok_or_else(|| TilawahError::validation(format!("surah {surah} out of range 1-114")))
}

pub fn surah_name_ar(surah: u32) -> TilawahResult<&'static str> {
    SURAH_NAMES_AR
        .get(surah.wrapping_sub(1) as usize)
        .copied()
        .ok_or_else(|| TilawahError::validation(format!("surah {surah} out of range 1-114")))
}

pub fn surah_name_en(surah: u32) -> TilawahResult<&'static str> {
    SURAH_NAMES_EN
        .get(surah.wrapping_sub(1) as usize)
        .copied()
        .ok_or_else(|| TilawahError::validation(format!("surah {surah} out of range 1-114")))
}

/// Clamps an ayah range to the surah, rejecting inverted requests.
pub fn validate_verse_range(surah: u32, start: u32, end: u32) -> TilawahResult<(u32, u32)> {
    let count = verse_count(surah)?;
    let start = start.clamp(1, count);
    let end = end.clamp(1, count);
    if start > end {
        return Err(TilawahError::validation(format!(
            "ayah range {start}-{end} is inverted"
        )));
    }
    Ok((start, end))
}

// --- quran.com v4 wire format -------------------------------------------

#[derive(Debug, serde::Deserialize)]
struct VerseEnvelope {
    verse: VersePayload,
}

#[derive(Debug, serde::Deserialize)]
struct VersePayload {
    #[serde(default)]
    text_uthmani: Option<String>,
    #[serde(default)]
    words: Vec<WordPayload>,
    #[serde(default)]
    translations: Vec<TranslationPayload>,
    #[serde(default)]
    audio: Option<AudioPayload>,
}

#[derive(Debug, serde::Deserialize)]
struct WordPayload {
    position: u32,
    #[serde(default)]
    text_uthmani: Option<String>,
    #[serde(default)]
    char_type_name: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct TranslationPayload {
    #[serde(default)]
    text: String,
}

#[derive(Debug, serde::Deserialize)]
struct AudioPayload {
    url: String,
    /// Per-word timestamps; rows are `[word, start_ms, end_ms]` or
    /// `[segment, word, start_ms, end_ms]` depending on the recitation.
    #[serde(default)]
    segments: Vec<Vec<i64>>,
}

/// One fetched verse, decoded and normalized from the API payload.
#[derive(Clone, Debug, Default)]
pub struct VerseData {
    pub text: String,
    pub translation: String,
    pub audio_url: Option<String>,
    pub word_timings: Vec<WordTiming>,
    pub word_texts: WordTexts,
}

fn normalize_payload(payload: VersePayload) -> VerseData {
    let mut word_texts = WordTexts::new();
    for w in &payload.words {
        let is_word = w.char_type_name.as_deref().is_none_or(|t| t == "word");
        if !is_word {
            continue;
        }
        if let Some(text) = &w.text_uthmani
            && !text.is_empty()
        {
            word_texts.insert(w.position, text.clone());
        }
    }

    let text = payload
        .text_uthmani
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| crate::timing::joined_text(&word_texts));

    let translation = payload
        .translations
        .first()
        .map(|t| strip_tags(&t.text))
        .unwrap_or_default();

    let (audio_url, mut word_timings) = match payload.audio {
        Some(audio) => {
            let timings = audio
                .segments
                .iter()
                .filter_map(|row| match row.as_slice() {
                    [word, start, end] | [_, word, start, end] => {
                        // Rows must be well-formed and point at a word we
                        // actually have text for; page computation assumes
                        // pre-validated input.
                        let known = *word >= 1 && word_texts.contains_key(&(*word as u32));
                        if known && *start >= 0 && *end > *start {
                            Some(WordTiming {
                                word_index: *word as u32,
                                start_ms: *start as u64,
                                end_ms: *end as u64,
                            })
                        } else {
                            None
                        }
                    }
                    _ => None,
                })
                .collect();
            (Some(resolve_audio_url(&audio.url)), timings)
        }
        None => (None, Vec::new()),
    };
    sort_by_start(&mut word_timings);

    VerseData {
        text,
        translation,
        audio_url,
        word_timings,
        word_texts,
    }
}

fn resolve_audio_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("{}{}", AUDIO_CDN_BASE, url.trim_start_matches('/'))
    }
}

/// Drops HTML markup (translation texts carry `<sup>` footnote anchors).
pub fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Blocking HTTP client for the quran.com v4 API.
pub struct QuranClient {
    http: reqwest::blocking::Client,
    base: String,
}

impl QuranClient {
    pub fn new(base: &str) -> TilawahResult<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("tilawah/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TilawahError::fetch("client", format!("http client init: {e}")))?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn fetch_verse(&self, surah: u32, ayah: u32, reciter_id: u32) -> TilawahResult<VerseData> {
        let unit = format!("{surah}:{ayah}");
        let url = format!(
            "{}/verses/by_key/{unit}?words=true&word_fields=text_uthmani\
             &fields=text_uthmani&translations=131&audio={reciter_id}",
            self.base
        );

        let envelope: VerseEnvelope = self
            .http
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| TilawahError::fetch(&unit, format!("verse request failed: {e}")))?
            .json()
            .map_err(|e| TilawahError::fetch(&unit, format!("verse payload decode failed: {e}")))?;

        Ok(normalize_payload(envelope.verse))
    }

    /// Downloads `url` to `dest` unless it already exists.
    pub fn download(&self, url: &str, dest: &std::path::Path) -> TilawahResult<()> {
        if dest.exists() {
            return Ok(());
        }
        if let Some(parent) = dest.parent() {
            use anyhow::Context as _;
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create audio dir '{}'", parent.display()))?;
        }

        tracing::info!(url, dest = %dest.display(), "downloading audio");
        let bytes = self
            .http
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.bytes())
            .map_err(|e| TilawahError::fetch(url, format!("audio download failed: {e}")))?;

        std::fs::write(dest, &bytes)
            .map_err(|e| TilawahError::fetch(url, format!("audio write failed: {e}")))?;
        Ok(())
    }
}

/// [`UnitSource`] over the live API: fetches verse data, downloads the
/// narration audio, probes its duration.
pub struct VerseUnitSource<'a> {
    client: &'a QuranClient,
    surah: u32,
    reciter: &'static Reciter,
    audio_dir: PathBuf,
}

impl<'a> VerseUnitSource<'a> {
    pub fn new(
        client: &'a QuranClient,
        surah: u32,
        reciter: &'static Reciter,
        audio_dir: PathBuf,
    ) -> Self {
        Self {
            client,
            surah,
            reciter,
            audio_dir,
        }
    }
}

impl UnitSource for VerseUnitSource<'_> {
    fn fetch(&mut self, ayah: u32) -> TilawahResult<UnitData> {
        let unit = format!("{}:{}", self.surah, ayah);
        let verse = self.client.fetch_verse(self.surah, ayah, self.reciter.v4_id)?;

        let audio_url = verse
            .audio_url
            .as_deref()
            .ok_or_else(|| TilawahError::fetch(&unit, "no audio available for this recitation"))?;

        let audio_path = self.audio_dir.join(format!(
            "ayah_{}_{:03}_{:03}.mp3",
            self.reciter.key, self.surah, ayah
        ));
        self.client.download(audio_url, &audio_path)?;
        let audio_duration = probe_duration(&audio_path);

        Ok(UnitData {
            text: verse.text,
            translation: verse.translation,
            audio_path,
            audio_duration,
            word_timings: verse.word_timings,
            word_texts: verse.word_texts,
        })
    }
}
