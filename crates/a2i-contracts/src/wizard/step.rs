use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    #[default]
    Upload,
    SelectObject,
    RefineMask,
    ChooseAnimal,
    EditPrompt,
    Result,
    Enhance,
}

impl WizardStep {
    pub const ALL: [WizardStep; 7] = [
        WizardStep::Upload,
        WizardStep::SelectObject,
        WizardStep::RefineMask,
        WizardStep::ChooseAnimal,
        WizardStep::EditPrompt,
        WizardStep::Result,
        WizardStep::Enhance,
    ];

    pub fn number(self) -> u8 {
        match self {
            Self::Upload => 1,
            Self::SelectObject => 2,
            Self::RefineMask => 3,
            Self::ChooseAnimal => 4,
            Self::EditPrompt => 5,
            Self::Result => 6,
            Self::Enhance => 7,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|step| step.number() == number)
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Upload => "Upload",
            Self::SelectObject => "Select Object",
            Self::RefineMask => "Refine Mask",
            Self::ChooseAnimal => "Choose Animal",
            Self::EditPrompt => "Edit Prompt",
            Self::Result => "Result",
            Self::Enhance => "Enhance",
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.number(), self.title())
    }
}

#[cfg(test)]
mod tests {
    use super::WizardStep;

    #[test]
    fn numbers_cover_one_through_seven() {
        let numbers: Vec<u8> = WizardStep::ALL.iter().map(|step| step.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6, 7]);
        for step in WizardStep::ALL {
            assert_eq!(WizardStep::from_number(step.number()), Some(step));
        }
    }

    #[test]
    fn out_of_range_numbers_are_rejected() {
        assert_eq!(WizardStep::from_number(0), None);
        assert_eq!(WizardStep::from_number(8), None);
    }

    #[test]
    fn display_includes_number_and_title() {
        assert_eq!(WizardStep::ChooseAnimal.to_string(), "4. Choose Animal");
        assert_eq!(WizardStep::default(), WizardStep::Upload);
    }
}
