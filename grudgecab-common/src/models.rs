use std::fmt;

use chrono::NaiveDateTime;

macro_rules! rating {
    (
        $(#[$meta:meta])*
        $name:ident, $question:literal, {
            $( $variant:ident = $code:literal, $rename:literal, $label:literal; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
        #[derive(serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $( #[serde(rename = $rename)] $variant, )*
        }

        impl $name {
            /// Variants in questionnaire order.
            pub const ALL: &'static [$name] = &[ $( $name::$variant, )* ];

            /// The question this rating answers.
            pub const QUESTION: &'static str = $question;

            pub fn code(self) -> i64 {
                match self {
                    $( $name::$variant => $code, )*
                }
            }

            pub fn label(self) -> &'static str {
                match self {
                    $( $name::$variant => $label, )*
                }
            }
        }

        impl TryFrom<i64> for $name {
            type Error = crate::Report;

            fn try_from(code: i64) -> Result<Self, Self::Error> {
                match code {
                    $( $code => Ok($name::$variant), )*
                    other => Err(crate::err!(
                        concat!("`{}` is not a valid ", stringify!($name), " code"),
                        other
                    )),
                }
            }
        }
    };
}

rating! {
    /// How bad the grudgee's intention was. Bad intentions make for
    /// higher-carat grudges.
    Intention, "How bad was the intention of the grudgee?", {
        DefinitelyBad = 3, "definitely-bad", "a) definitely or probably bad";
        PossiblyBad = 2, "possibly-bad", "b) possibly bad";
        NotBad = 1, "not-bad", "c) not bad";
    }
}

rating! {
    /// The grudgee's foreknowledge of the harm they were causing.
    Knowledge, "Did they know they were upsetting, hurting, or being unfair to you?", {
        Definitely = 3, "definitely", "a) yes, definitely";
        Possibly = 2, "possibly", "b) possibly";
        No = 1, "no", "c) not at all";
    }
}

rating! {
    Seriousness, "How serious was the situation overall?", {
        VerySerious = 3, "very-serious", "a) very serious";
        SomewhatSerious = 2, "somewhat-serious", "b) somewhat serious";
        NotSerious = 1, "not-serious", "c) not very serious";
    }
}

rating! {
    /// The strength of the offense's negative impact.
    StrengthOfEffect, "Was the effect it had on you:", {
        VeryBad = 3, "very-bad", "a) very bad";
        QuiteBad = 2, "quite-bad", "b) quite bad";
        NotSoBad = 1, "not-so-bad", "c) not so bad";
    }
}

rating! {
    /// Whether the grudgee could or should have known better.
    GrudgeeSkill, "Should or could they have known/done better?", {
        Yes = 3, "yes", "a) yes";
        Maybe = 2, "maybe", "b) maybe";
        No = 1, "no", "c) no";
    }
}

rating! {
    HarmScale, "Did they cause you real harm?", {
        Yes = 3, "yes", "a) yes";
        Maybe = 2, "maybe", "b) maybe";
        No = 1, "no", "c) no";
    }
}

rating! {
    /// How strongly the incident still rankles.
    GrrFactor, "Is the `Grrrr!` factor of this grudge:", {
        High = 3, "high", "a) high";
        Medium = 2, "medium", "b) medium";
        Low = 1, "low", "c) low";
    }
}

rating! {
    GrudgeLength, "Have you held this grudge:", {
        VeryLong = 3, "very-long", "a) for ages; or, for not very long but you know it'll last forever";
        Medium = 2, "medium", "b) for a medium length of time; or for a short time and you think you'll hold it for a bit longer but not forever";
        Short = 1, "short", "c) for a short time, and you'll probably have given up this grudge by next week";
    }
}

rating! {
    /// Risk averted by the grudgee's action. Lightens the grudge.
    GrudgeeRisk, "Would something bad or frightening have happened to your grudgee if they hadn't performed the grudge-sparking action?", {
        No = 0, "no", "a) no";
        Yes = -1, "yes", "b) yes";
    }
}

rating! {
    /// Whether a full apology would cancel the grudge. Lightens the grudge.
    EasilyForgiven, "Would this grudge be canceled out/terminated if your grudgee apologized fully and wholeheartedly?", {
        No = 0, "no", "a) no";
        Yes = -1, "yes", "b) yes";
    }
}

rating! {
    GrudgeeSignificance, "Is your grudgee someone who matters to you, and to whom you matter?", {
        Massively = 4, "massively", "a) yes, massively";
        QuiteALot = 2, "quite-a-lot", "b) yes, quite a lot";
        NotEspecially = 0, "not-especially", "c) not especially—only as a fellow human being";
    }
}

/// The raw integer codes of a full questionnaire, before validation.
///
/// This is the shape rated attributes take at the edges, in database rows
/// and submitted forms. Decoding into [`Ratings`] is the point where
/// out-of-enumeration codes get rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RatingCodes {
    pub grudgee_intention: i64,
    pub grudgee_knowledge: i64,
    pub seriousness_of_situation: i64,
    pub grudge_effect: i64,
    pub grudgee_skill: i64,
    pub harm_level: i64,
    pub grr_factor: i64,
    pub grudge_length: i64,
    pub grudgee_risk: i64,
    pub grudge_easily_forgiven: i64,
    pub grudgee_significance: i64,
}

/// A grudge's full set of rated attributes.
///
/// Invalid codes are unrepresentable here, so the carat sum never needs to
/// validate its inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Ratings {
    pub grudgee_intention: Intention,
    pub grudgee_knowledge: Knowledge,
    pub seriousness_of_situation: Seriousness,
    pub grudge_effect: StrengthOfEffect,
    pub grudgee_skill: GrudgeeSkill,
    pub harm_level: HarmScale,
    pub grr_factor: GrrFactor,
    pub grudge_length: GrudgeLength,
    pub grudgee_risk: GrudgeeRisk,
    pub grudge_easily_forgiven: EasilyForgiven,
    pub grudgee_significance: GrudgeeSignificance,
}

impl Ratings {
    /// The carat weight of these ratings.
    ///
    /// Like diamonds, grudges can be on the lighter or weightier side. The
    /// value is the signed sum of every rated attribute's code, recomputed
    /// on every call.
    pub fn carat(&self) -> i64 {
        self.grudgee_intention.code()
            + self.grudgee_knowledge.code()
            + self.seriousness_of_situation.code()
            + self.grudge_effect.code()
            + self.grudgee_skill.code()
            + self.harm_level.code()
            + self.grr_factor.code()
            + self.grudge_length.code()
            + self.grudgee_risk.code()
            + self.grudge_easily_forgiven.code()
            + self.grudgee_significance.code()
    }

    pub fn codes(&self) -> RatingCodes {
        RatingCodes {
            grudgee_intention: self.grudgee_intention.code(),
            grudgee_knowledge: self.grudgee_knowledge.code(),
            seriousness_of_situation: self.seriousness_of_situation.code(),
            grudge_effect: self.grudge_effect.code(),
            grudgee_skill: self.grudgee_skill.code(),
            harm_level: self.harm_level.code(),
            grr_factor: self.grr_factor.code(),
            grudge_length: self.grudge_length.code(),
            grudgee_risk: self.grudgee_risk.code(),
            grudge_easily_forgiven: self.grudge_easily_forgiven.code(),
            grudgee_significance: self.grudgee_significance.code(),
        }
    }

    /// Question, answer, and code for every rated attribute, in
    /// questionnaire order.
    pub fn entries(&self) -> Vec<Entry> {
        vec![
            Entry::new(Intention::QUESTION, self.grudgee_intention.label(), self.grudgee_intention.code()),
            Entry::new(Knowledge::QUESTION, self.grudgee_knowledge.label(), self.grudgee_knowledge.code()),
            Entry::new(Seriousness::QUESTION, self.seriousness_of_situation.label(), self.seriousness_of_situation.code()),
            Entry::new(StrengthOfEffect::QUESTION, self.grudge_effect.label(), self.grudge_effect.code()),
            Entry::new(GrudgeeSkill::QUESTION, self.grudgee_skill.label(), self.grudgee_skill.code()),
            Entry::new(HarmScale::QUESTION, self.harm_level.label(), self.harm_level.code()),
            Entry::new(GrrFactor::QUESTION, self.grr_factor.label(), self.grr_factor.code()),
            Entry::new(GrudgeLength::QUESTION, self.grudge_length.label(), self.grudge_length.code()),
            Entry::new(GrudgeeRisk::QUESTION, self.grudgee_risk.label(), self.grudgee_risk.code()),
            Entry::new(EasilyForgiven::QUESTION, self.grudge_easily_forgiven.label(), self.grudge_easily_forgiven.code()),
            Entry::new(GrudgeeSignificance::QUESTION, self.grudgee_significance.label(), self.grudgee_significance.code()),
        ]
    }
}

impl TryFrom<RatingCodes> for Ratings {
    type Error = crate::Report;

    fn try_from(codes: RatingCodes) -> Result<Self, Self::Error> {
        Ok(Self {
            grudgee_intention: codes.grudgee_intention.try_into()?,
            grudgee_knowledge: codes.grudgee_knowledge.try_into()?,
            seriousness_of_situation: codes.seriousness_of_situation.try_into()?,
            grudge_effect: codes.grudge_effect.try_into()?,
            grudgee_skill: codes.grudgee_skill.try_into()?,
            harm_level: codes.harm_level.try_into()?,
            grr_factor: codes.grr_factor.try_into()?,
            grudge_length: codes.grudge_length.try_into()?,
            grudgee_risk: codes.grudgee_risk.try_into()?,
            grudge_easily_forgiven: codes.grudge_easily_forgiven.try_into()?,
            grudgee_significance: codes.grudgee_significance.try_into()?,
        })
    }
}

/// A single answered question, ready for display.
#[derive(Clone, Debug)]
pub struct Entry {
    pub question: &'static str,
    pub answer: &'static str,
    pub code: i64,
}

impl Entry {
    fn new(question: &'static str, answer: &'static str, code: i64) -> Self {
        Self {
            question,
            answer,
            code,
        }
    }
}

/// The story behind a grudge.
#[derive(Clone, Debug, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Story {
    pub id: i64,
    pub title: String,
    /// The origin story of this grudge. Be specific.
    pub origin: String,
    pub created: NaiveDateTime,
    pub updated: NaiveDateTime,
}

/// A recorded grievance.
///
/// `ratings` is `None` only for records that were never persisted; the
/// storage layer refuses to store a grudge without its full questionnaire.
#[derive(Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Grudge {
    pub id: i64,
    pub story: Option<Story>,
    pub ratings: Option<Ratings>,
    pub created: NaiveDateTime,
    pub updated: NaiveDateTime,
}

impl Grudge {
    /// The carat weight of this grudge, or `None` when the rated
    /// attributes have not been assigned yet.
    ///
    /// `None` is a first-class outcome, not an error: a freshly
    /// constructed grudge has no weight at all, which is different from
    /// weighing zero.
    pub fn carat(&self) -> Option<i64> {
        self.ratings.as_ref().map(Ratings::carat)
    }
}

impl fmt::Display for Grudge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.story {
            Some(story) => write!(f, "Grudge for {}", story.title),
            None => write!(f, "Grudge {}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(
        additive: i64,
        risk: i64,
        forgiven: i64,
        significance: i64,
    ) -> RatingCodes {
        RatingCodes {
            grudgee_intention: additive,
            grudgee_knowledge: additive,
            seriousness_of_situation: additive,
            grudge_effect: additive,
            grudgee_skill: additive,
            harm_level: additive,
            grr_factor: additive,
            grudge_length: additive,
            grudgee_risk: risk,
            grudge_easily_forgiven: forgiven,
            grudgee_significance: significance,
        }
    }

    fn ratings(additive: i64, risk: i64, forgiven: i64, significance: i64) -> Ratings {
        Ratings::try_from(codes(additive, risk, forgiven, significance)).unwrap()
    }

    fn grudge(ratings: Option<Ratings>, story: Option<Story>) -> Grudge {
        let now = NaiveDateTime::from_timestamp(1_650_000_000, 0);

        Grudge {
            id: 7,
            story,
            ratings,
            created: now,
            updated: now,
        }
    }

    fn story(title: &str) -> Story {
        let now = NaiveDateTime::from_timestamp(1_650_000_000, 0);

        Story {
            id: 3,
            title: title.to_string(),
            origin: "They ate the last slice without asking.".to_string(),
            created: now,
            updated: now,
        }
    }

    #[test]
    fn heaviest_possible_grudge_is_twenty_eight_carats() {
        assert_eq!(ratings(3, 0, 0, 4).carat(), 28);
    }

    #[test]
    fn middling_grudge_is_sixteen_carats() {
        assert_eq!(ratings(2, -1, -1, 2).carat(), 16);
    }

    #[test]
    fn lightest_possible_grudge_is_six_carats() {
        assert_eq!(ratings(1, -1, -1, 0).carat(), 6);
    }

    #[test]
    fn unrated_grudge_has_no_carat_value() {
        assert_eq!(grudge(None, None).carat(), None);
    }

    #[test]
    fn carat_is_recomputed_identically_on_every_call() {
        let grudge = grudge(Some(ratings(2, 0, -1, 2)), None);

        let first = grudge.carat();

        for _ in 0..16 {
            assert_eq!(grudge.carat(), first);
        }
    }

    #[test]
    fn carat_moves_one_for_one_with_any_single_code() {
        let base = ratings(2, -1, -1, 2);

        let mut bumped = base;
        bumped.grudgee_intention = Intention::DefinitelyBad;
        assert_eq!(bumped.carat(), base.carat() + 1);

        let mut bumped = base;
        bumped.grudgee_knowledge = Knowledge::Definitely;
        assert_eq!(bumped.carat(), base.carat() + 1);

        let mut bumped = base;
        bumped.seriousness_of_situation = Seriousness::VerySerious;
        assert_eq!(bumped.carat(), base.carat() + 1);

        let mut bumped = base;
        bumped.grudge_effect = StrengthOfEffect::VeryBad;
        assert_eq!(bumped.carat(), base.carat() + 1);

        let mut bumped = base;
        bumped.grudgee_skill = GrudgeeSkill::Yes;
        assert_eq!(bumped.carat(), base.carat() + 1);

        let mut bumped = base;
        bumped.harm_level = HarmScale::Yes;
        assert_eq!(bumped.carat(), base.carat() + 1);

        let mut bumped = base;
        bumped.grr_factor = GrrFactor::High;
        assert_eq!(bumped.carat(), base.carat() + 1);

        let mut bumped = base;
        bumped.grudge_length = GrudgeLength::VeryLong;
        assert_eq!(bumped.carat(), base.carat() + 1);

        let mut bumped = base;
        bumped.grudgee_risk = GrudgeeRisk::No;
        assert_eq!(bumped.carat(), base.carat() + 1);

        let mut bumped = base;
        bumped.grudge_easily_forgiven = EasilyForgiven::No;
        assert_eq!(bumped.carat(), base.carat() + 1);

        // Significance has no one-step codes; its delta still lands
        // code-for-code.
        let mut bumped = base;
        bumped.grudgee_significance = GrudgeeSignificance::Massively;
        assert_eq!(bumped.carat(), base.carat() + 2);
    }

    #[test]
    fn significance_spread_contributes_its_full_code() {
        let low = ratings(2, 0, 0, 0);
        let mid = ratings(2, 0, 0, 2);
        let high = ratings(2, 0, 0, 4);

        assert_eq!(mid.carat() - low.carat(), 2);
        assert_eq!(high.carat() - low.carat(), 4);
    }

    #[test]
    fn grudge_with_a_story_is_labeled_by_its_title() {
        let grudge = grudge(None, Some(story("The Unreturned Drill")));

        assert_eq!(grudge.to_string(), "Grudge for The Unreturned Drill");
    }

    #[test]
    fn grudge_without_a_story_falls_back_to_its_id() {
        assert_eq!(grudge(None, None).to_string(), "Grudge 7");
    }

    #[test]
    fn codes_round_trip_through_the_enumerations() {
        for profile in [
            codes(1, -1, -1, 0),
            codes(2, 0, -1, 2),
            codes(3, 0, 0, 4),
        ] {
            let ratings = Ratings::try_from(profile).unwrap();

            assert_eq!(ratings.codes(), profile);
        }
    }

    #[test]
    fn out_of_enumeration_codes_are_rejected() {
        assert!(Ratings::try_from(codes(4, 0, 0, 0)).is_err());
        assert!(Ratings::try_from(codes(0, 0, 0, 0)).is_err());
        assert!(Ratings::try_from(codes(2, 1, 0, 2)).is_err());
        assert!(Ratings::try_from(codes(2, 0, 0, 3)).is_err());
        assert!(GrudgeeSignificance::try_from(-2).is_err());
    }

    #[test]
    fn questionnaire_options_are_in_answer_order() {
        assert_eq!(Intention::ALL[0].label(), "a) definitely or probably bad");
        assert_eq!(Intention::ALL[2].code(), 1);
        assert_eq!(GrudgeeSignificance::ALL.len(), 3);
        assert_eq!(GrudgeeRisk::ALL.len(), 2);
    }
}
